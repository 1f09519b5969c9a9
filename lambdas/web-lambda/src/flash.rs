//! One-shot notices carried in the `flash` query parameter after a redirect.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash {
    BrandCreated,
    BrandCreateFailed,
    BrandsLoadFailed,
    BrandLoadFailed,
    PositioningSaved,
    PositioningSaveFailed,
    PositioningLoadFailed,
}

impl Flash {
    /// Unknown codes are ignored.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "brand_created" => Some(Self::BrandCreated),
            "brand_create_failed" => Some(Self::BrandCreateFailed),
            "brands_load_failed" => Some(Self::BrandsLoadFailed),
            "brand_load_failed" => Some(Self::BrandLoadFailed),
            "positioning_saved" => Some(Self::PositioningSaved),
            "positioning_save_failed" => Some(Self::PositioningSaveFailed),
            "positioning_load_failed" => Some(Self::PositioningLoadFailed),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::BrandCreated => "brand_created",
            Self::BrandCreateFailed => "brand_create_failed",
            Self::BrandsLoadFailed => "brands_load_failed",
            Self::BrandLoadFailed => "brand_load_failed",
            Self::PositioningSaved => "positioning_saved",
            Self::PositioningSaveFailed => "positioning_save_failed",
            Self::PositioningLoadFailed => "positioning_load_failed",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::BrandCreated => "Brand created successfully",
            Self::BrandCreateFailed => "Failed to create brand",
            Self::BrandsLoadFailed => "Failed to load brands",
            Self::BrandLoadFailed => "Failed to load brand details",
            Self::PositioningSaved => "Positioning saved successfully",
            Self::PositioningSaveFailed => "Failed to save positioning",
            Self::PositioningLoadFailed => "Failed to load positioning data",
        }
    }

    pub fn is_error(self) -> bool {
        !matches!(self, Self::BrandCreated | Self::PositioningSaved)
    }

    /// `path` with this notice attached.
    pub fn redirect_target(self, path: &str) -> String {
        format!("{}?flash={}", path, self.code())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FlashQuery {
    #[serde(default)]
    flash: Option<String>,
}

impl FlashQuery {
    pub fn flash(&self) -> Option<Flash> {
        self.flash.as_deref().and_then(Flash::from_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn codes_round_trip() {
        for flash in [
            Flash::BrandCreated,
            Flash::BrandCreateFailed,
            Flash::BrandsLoadFailed,
            Flash::BrandLoadFailed,
            Flash::PositioningSaved,
            Flash::PositioningSaveFailed,
            Flash::PositioningLoadFailed,
        ] {
            assert_eq!(Flash::from_code(flash.code()), Some(flash));
        }
    }

    #[test]
    fn unknown_code_is_ignored() {
        let query = FlashQuery {
            flash: Some("<script>".into()),
        };
        assert_eq!(query.flash(), None);
    }

    #[test]
    fn builds_redirect_target() {
        assert_eq!(
            Flash::BrandCreated.redirect_target("/dashboard"),
            "/dashboard?flash=brand_created"
        );
    }
}
