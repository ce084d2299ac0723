//! # structai-macros
//!
//! Procedural macros for structai.
//!
//! ## Shaped Macro
//!
//! `#[derive(Shaped)]` builds the shape descriptor of a record from its
//! fields, and makes the record usable as a nested field type.
//!
//! ```ignore
//! #[derive(Deserialize, Shaped)]
//! #[serde(rename_all = "camelCase")]
//! struct User {
//!     #[shape(rules = "required,min=1,max=50")]
//!     full_name: String,
//!     #[shape(rules = "required,email")]
//!     email: String,
//!     #[shape(rules = "gte=0,lte=150")]
//!     age: u32,
//!     #[shape(rules = "max=20", omit_empty)]
//!     nickname: String,
//! }
//! ```

extern crate proc_macro;

mod shaped;
mod utils;

use proc_macro::TokenStream;

/// Derive macro for implementing `Shaped` and `FieldTyped`.
///
/// Each named field becomes a shape field whose declared type comes from the
/// field's Rust type. The shape is built once, on first use.
///
/// # Container attributes
///
/// - `#[shape(name = "...")]` - Shape name (default: the struct name)
/// - `#[shape(description = "...")]` - Description (default: doc comments)
/// - `#[shape(validate)]` - Run the type's `SelfValidate` impl after field validation
/// - `#[shape(crate = "...")]` - Path to the validation crate (default: `::structai::validate`)
/// - `#[serde(rename_all = "...")]` - Honoured for external field names
///
/// # Field attributes
///
/// - `#[shape(rules = "...")]` - Comma separated rule list
/// - `#[shape(rename = "...")]` - External name (also read from `#[serde(rename)]`)
/// - `#[shape(omit_empty)]` - Skip rules when the field is absent
/// - `#[shape(skip)]` - Leave the field out (also `#[serde(skip)]`)
/// - `#[shape(description = "...")]` - Description (default: doc comments)
///
/// Generic and recursive types are not supported.
///
/// # Example
///
/// ```ignore
/// #[derive(Deserialize, Shaped)]
/// #[shape(validate)]
/// struct Booking {
///     #[shape(rules = "required")]
///     start: i64,
///     #[shape(rules = "required,gtfield=start")]
///     end: i64,
/// }
/// ```
#[proc_macro_derive(Shaped, attributes(shape))]
pub fn derive_shaped(input: TokenStream) -> TokenStream {
    shaped::derive_shaped_impl(input)
}
