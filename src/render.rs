//! Basic and full views.

use crate::driver::ResourceDriver;
use crate::error::ResourceError;
use resource_store::Etag;
use serde::Serialize;
use serde_json::Value;

/// View depth selected by the `recursion` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recursion {
    #[default]
    Basic,
    Full,
}

impl Recursion {
    /// Any non-zero integer selects the full view. Absent or unparsable values select
    /// the basic view.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim).and_then(|v| v.parse::<i64>().ok()) {
            Some(0) | None => Recursion::Basic,
            Some(_) => Recursion::Full,
        }
    }
}

/// A rendered view together with the etag of the record it was rendered from.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub metadata: Value,
    pub etag: Etag,
}

pub async fn render(
    driver: &dyn ResourceDriver,
    recursion: Recursion,
) -> Result<Rendered, ResourceError> {
    let metadata = match recursion {
        Recursion::Basic => driver.render().await?,
        Recursion::Full => driver.render_full().await?,
    };
    Ok(Rendered {
        metadata,
        etag: driver.etag().clone(),
    })
}

pub(crate) fn to_metadata<S: Serialize>(view: &S) -> Result<Value, ResourceError> {
    Ok(serde_json::to_value(view)?)
}
