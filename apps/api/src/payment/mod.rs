// Payment: signed checkout redirects to the hosted payment page and the
// provider's success / failure / notify callbacks.

pub mod fulfilment;
pub mod gateway;
pub mod handlers;
pub mod signing;

pub use gateway::PaymentGateway;
