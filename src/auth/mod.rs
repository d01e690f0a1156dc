pub mod jwt;
pub mod password;

pub use jwt::{Claims, TokenPair, TokenService, TokenType};
pub use password::{hash_password, verify_password, verify_unknown_user};
