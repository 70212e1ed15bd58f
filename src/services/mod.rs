pub mod daily_source;
