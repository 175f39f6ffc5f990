// Pre-generated coupon codes that pay for a session in place of the payment page.

pub mod codes;
pub mod handlers;
pub mod redeem;
