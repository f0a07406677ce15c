pub mod usd;
