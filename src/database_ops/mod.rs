pub mod db;
pub mod leaderboards;
pub mod reconcile;
