use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A sellable product: what to launch and how to bill it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDefinition {
    pub product_code: String,
    pub full_name: String,
    pub product_token: String,
    pub ami_image_id: String,
    pub instance_size: String,
}

/// Find the single product with `product_code`.
///
/// Zero or several matches mean the catalog is broken, not the request.
pub fn lookup<'a>(products: &'a [ProductDefinition], product_code: &str) -> Result<&'a ProductDefinition> {
    let mut matches = products.iter().filter(|p| p.product_code == product_code);

    match (matches.next(), matches.next()) {
        (Some(product), None) => Ok(product),
        (None, _) => Err(Error::Config(format!(
            "product code {product_code:?} matches no products"
        ))),
        (Some(_), Some(_)) => Err(Error::Config(format!(
            "product code {product_code:?} matches {} products",
            2 + matches.count()
        ))),
    }
}
