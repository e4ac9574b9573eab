pub mod list;
pub mod token;

pub use list::{ListDetails, ListVersion, TokenList, TokenListManifest, CUSTOM_LIST_ID, NATIVE_LIST_ID};
pub use token::{token_key, Address, Token, MAX_DECIMALS};
