pub mod ledger;
pub mod lnurl;
pub mod payments;
pub mod rate;
