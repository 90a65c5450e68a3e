pub mod fx;
pub mod mpesa;
pub mod paypal;

pub use fx::RateClient;
pub use mpesa::MpesaClient;
pub use paypal::PayPalClient;
