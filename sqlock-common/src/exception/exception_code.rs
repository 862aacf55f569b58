#![allow(non_snake_case)]

use super::exception::ErrorCode;

macro_rules! build_exceptions {
    ($($body:ident($code:expr)),*$(,)*) => {
            impl ErrorCode {
                $(
                pub fn $body(display_text: impl Into<String>) -> ErrorCode {
                    ErrorCode::create($code, display_text.into())
                }
                paste::item! {
                    pub fn [< $body:snake _ code >] ()  -> u16{
                        $code
                    }

                    pub fn [< $body  Code >] ()  -> u16{
                        $code
                    }
                }
                )*
            }
    }
}

// Internal errors [0, 2000].
build_exceptions! {
    ValidationError(1002),
    UnsupportedOperation(1003),
    StoreError(1010),
    Cancelled(1011),
    IllegalOwnershipState(1012),
}
