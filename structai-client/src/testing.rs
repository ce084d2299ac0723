//! Shared fixtures for unit tests.

use serde::Deserialize;
use std::sync::{Arc, OnceLock};
use structai_validate::{FieldType, Shape, Shaped, StructValidator};

pub const VALID_USER: &str = r#"{"name": "Alice", "email": "alice@example.com", "age": 30}"#;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
    pub age: u32,
}

impl Shaped for User {
    fn shape() -> Arc<Shape> {
        static SHAPE: OnceLock<Arc<Shape>> = OnceLock::new();
        SHAPE
            .get_or_init(|| {
                let shape = Shape::builder("User")
                    .field("name", FieldType::String, "required,min=1")
                    .field("email", FieldType::String, "required,email")
                    .field("age", FieldType::int(), "required,gte=0,lte=150")
                    .build()
                    .expect("user shape");
                Arc::new(shape)
            })
            .clone()
    }
}

pub fn user_validator() -> StructValidator {
    StructValidator::of::<User>()
}
