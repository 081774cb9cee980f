/// Lets a strum-backed enum be read straight out of a VARCHAR column
/// with `#[sqlx(try_from = "String")]`.
macro_rules! string_column {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl TryFrom<String> for $ty {
                type Error = strum::ParseError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    value.parse()
                }
            }
        )+
    };
}

pub mod leave_request;
pub mod payroll;
pub mod role;
pub mod staff;
