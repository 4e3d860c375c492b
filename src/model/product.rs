use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::money::Money;

/// A sellable plan and the rate class its commission is looked up by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDefinition {
    pub product_id: String,
    pub plan_name: String,
    /// Key into the affiliate's base rate table (e.g. "basic", "intermediate").
    pub plan_class: String,
    pub price: Money,
}

/// Known products keyed by product identifier.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    products: HashMap<String, ProductDefinition>,
}

impl ProductCatalog {
    pub fn new(products: Vec<ProductDefinition>) -> Result<Self, LedgerError> {
        let mut map = HashMap::with_capacity(products.len());
        for product in products {
            if product.product_id.trim().is_empty() || product.plan_class.trim().is_empty() {
                return Err(LedgerError::Config(
                    "product id and plan class are required".into(),
                ));
            }
            if product.price.is_negative() {
                return Err(LedgerError::Config(format!(
                    "product {} has a negative price",
                    product.product_id
                )));
            }
            if map.insert(product.product_id.clone(), product).is_some() {
                return Err(LedgerError::Config("duplicate product id".into()));
            }
        }
        Ok(Self { products: map })
    }

    pub fn standard() -> Self {
        Self::new(standard_products()).unwrap_or_default()
    }

    pub fn get(&self, product_id: &str) -> Option<&ProductDefinition> {
        self.products.get(product_id.trim())
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

pub fn standard_products() -> Vec<ProductDefinition> {
    vec![
        ProductDefinition {
            product_id: "meal_plan_basic_annual".into(),
            plan_name: "Basic Annual".into(),
            plan_class: "basic".into(),
            price: Money::from_cents(11_900),
        },
        ProductDefinition {
            product_id: "meal_plan_intermediate_annual".into(),
            plan_name: "Intermediate Annual".into(),
            plan_class: "intermediate".into(),
            price: Money::from_cents(23_900),
        },
    ]
}
