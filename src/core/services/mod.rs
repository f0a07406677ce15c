pub mod dollar_rate;
pub mod payment_broker;

pub use dollar_rate::DollarRate;
pub use payment_broker::{PaymentBroker, PaymentWaiter};
