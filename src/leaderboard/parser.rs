//! Leaderboard extraction from the rendered kiosk markup.
//!
//! The page shape is not under our control, so every lookup degrades to a
//! fallback (or drops the row) instead of failing.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{GameBlock, ScoreRow, Snapshot, UNKNOWN};

const TITLE_SUFFIX: &str = "High Scores";

struct Selectors {
    card: Selector,
    title: Selector,
    header_img: Selector,
    row: Selector,
    username: Selector,
    score: Selector,
    icon: Selector,
    color_holder: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        let css = |s: &str| Selector::parse(s).expect("static leaderboard selector");
        Selectors {
            card: css(".list-item.card.list"),
            title: css(".leaderboard-header p.hd-xs"),
            header_img: css(".leaderboard-header img"),
            row: css("li"),
            username: css("p.font-semibold"),
            score: css("div.text-vintage"),
            icon: css(".bg-profile img"),
            color_holder: css(".flex.justify-end.items-center"),
        }
    })
}

fn profile_color_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"--profile-color: (#[0-9a-fA-F]+)").expect("static color regex"))
}

/// Parse every leaderboard card in `html`.
///
/// Cards sharing a title (including the `"Unknown"` fallback) overwrite each
/// other: the last card's block wins while the key keeps its first position.
pub fn parse(html: &str) -> Snapshot {
    let sel = selectors();
    let document = Html::parse_document(html);
    let mut games = Snapshot::new();

    for card in document.select(&sel.card) {
        let title = joined_text(card, &sel.title).replacen(TITLE_SUFFIX, "", 1);
        let title = title.trim();
        let name = if title.is_empty() { UNKNOWN } else { title };

        let header_url = first_attr(card, &sel.header_img, "src")
            .filter(|src| !src.is_empty())
            .unwrap_or(UNKNOWN);

        let mut block = GameBlock::new(header_url);
        for row in card.select(&sel.row) {
            if let Some(score) = parse_row(row, sel) {
                block.scores.push(score);
            }
        }

        debug!(game = %name, rows = block.scores.len(), "parsed leaderboard card");
        if games.insert(name.to_string(), block).is_some() {
            debug!(game = %name, "duplicate leaderboard title; keeping the later card");
        }
    }

    games
}

fn parse_row(row: ElementRef<'_>, sel: &Selectors) -> Option<ScoreRow> {
    let username = joined_text(row, &sel.username).trim().to_string();
    let score = joined_text(row, &sel.score).trim().replace(',', "");
    if username.is_empty() || score.is_empty() {
        return None;
    }

    let icon_url = first_attr(row, &sel.icon, "src").map(str::to_string);
    let color_rgb = first_attr(row, &sel.color_holder, "style").and_then(extract_profile_color);

    Some(ScoreRow {
        username,
        score,
        icon_url,
        color_rgb,
    })
}

/// Pull the `--profile-color: #RRGGBB` custom property out of an inline style.
pub fn extract_profile_color(style: &str) -> Option<String> {
    profile_color_re()
        .captures(style)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Text of every match concatenated, like jQuery-style `.text()` on a set.
fn joined_text(scope: ElementRef<'_>, selector: &Selector) -> String {
    scope.select(selector).flat_map(|el| el.text()).collect()
}

fn first_attr<'a>(scope: ElementRef<'a>, selector: &Selector, attr: &str) -> Option<&'a str> {
    scope.select(selector).next().and_then(|el| el.value().attr(attr))
}
