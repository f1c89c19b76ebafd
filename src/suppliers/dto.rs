use serde::Deserialize;

use crate::error::{AppError, FieldError};

#[derive(Debug, Deserialize)]
pub struct CreateSupplierRequest {
    pub name: String,
    pub street: String,
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
}

impl CreateSupplierRequest {
    pub fn validate(mut self) -> Result<Self, AppError> {
        self.name = self.name.trim().to_lowercase();
        self.street = self.street.trim().to_string();
        self.city = self.city.trim().to_lowercase();
        self.country = self.country.trim().to_lowercase();
        self.phone_numbers.retain(|p| !p.trim().is_empty());

        let mut errors = Vec::new();
        for (field, value) in [
            ("name", &self.name),
            ("street", &self.street),
            ("city", &self.city),
            ("country", &self.country),
        ] {
            if value.is_empty() {
                errors.push(FieldError::new(field, format!("{field} is required"), ""));
            }
        }
        if self.phone_numbers.is_empty() {
            errors.push(FieldError::new(
                "phone_numbers",
                "at least one phone number is required",
                "",
            ));
        }
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSupplierRequest {
    pub name: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub phone_numbers: Option<Vec<String>>,
}
