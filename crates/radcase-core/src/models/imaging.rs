//! Imaging catalog models.

use serde::{Deserialize, Serialize};

/// Id of the synthetic "no imaging indicated" option.
pub const NO_IMAGING_ID: &str = "no-imaging";

/// An imaging technique.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Xray,
    Ct,
    Mri,
    Ultrasound,
    Nuclear,
    Fluoroscopy,
    Mammography,
    Pet,
    /// No imaging indicated
    #[serde(rename = "none")]
    NoImaging,
}

impl_str_enum!(Modality {
    Xray => "xray",
    Ct => "ct",
    Mri => "mri",
    Ultrasound => "ultrasound",
    Nuclear => "nuclear",
    Fluoroscopy => "fluoroscopy",
    Mammography => "mammography",
    Pet => "pet",
    NoImaging => "none",
});

impl Modality {
    /// All imaging techniques, excluding "none".
    pub const IMAGING: [Modality; 8] = [
        Modality::Xray,
        Modality::Ct,
        Modality::Mri,
        Modality::Ultrasound,
        Modality::Nuclear,
        Modality::Fluoroscopy,
        Modality::Mammography,
        Modality::Pet,
    ];

    /// Human-readable name used in rationales.
    pub fn display_name(&self) -> &'static str {
        match self {
            Modality::Xray => "X-ray",
            Modality::Ct => "CT",
            Modality::Mri => "MRI",
            Modality::Ultrasound => "Ultrasound",
            Modality::Nuclear => "Nuclear medicine",
            Modality::Fluoroscopy => "Fluoroscopy",
            Modality::Mammography => "Mammography",
            Modality::Pet => "PET",
            Modality::NoImaging => "No imaging",
        }
    }
}

/// A candidate imaging study offered to the learner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImagingOption {
    /// Unique id within the case catalog
    pub id: String,
    /// Display name (e.g., "MRI lumbar spine with and without contrast")
    #[serde(default)]
    pub name: String,
    /// Imaging technique
    pub modality: Modality,
    /// Whether the study uses IV contrast
    #[serde(default)]
    pub contrast: bool,
    /// Approximate cost in USD
    pub cost_usd: f64,
    /// Effective radiation dose in mSv
    pub radiation_msv: f64,
}

impl ImagingOption {
    /// Create an option with required fields.
    pub fn new(id: impl Into<String>, modality: Modality, cost_usd: f64, radiation_msv: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            modality,
            contrast: false,
            cost_usd,
            radiation_msv,
        }
    }

    /// Mark the option as a contrast study (builder style).
    pub fn with_contrast(mut self) -> Self {
        self.contrast = true;
        self
    }

    /// The synthetic "no imaging" option.
    pub fn no_imaging() -> Self {
        Self {
            id: NO_IMAGING_ID.into(),
            name: "No imaging indicated".into(),
            modality: Modality::NoImaging,
            contrast: false,
            cost_usd: 0.0,
            radiation_msv: 0.0,
        }
    }

    pub fn is_no_imaging(&self) -> bool {
        self.modality == Modality::NoImaging
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modality_wire_names() {
        assert_eq!(serde_json::to_string(&Modality::Xray).unwrap(), "\"xray\"");
        assert_eq!(serde_json::to_string(&Modality::NoImaging).unwrap(), "\"none\"");
        assert_eq!("MRI".parse::<Modality>(), Ok(Modality::Mri));
        assert_eq!("none".parse::<Modality>(), Ok(Modality::NoImaging));
    }

    #[test]
    fn test_no_imaging_is_free() {
        let option = ImagingOption::no_imaging();
        assert!(option.is_no_imaging());
        assert_eq!(option.id, NO_IMAGING_ID);
        assert_eq!(option.cost_usd, 0.0);
        assert_eq!(option.radiation_msv, 0.0);
    }

    #[test]
    fn test_option_deserialize() {
        let json = r#"{"id": "mri-c", "modality": "mri", "contrast": true, "cost_usd": 1800, "radiation_msv": 0}"#;
        let option: ImagingOption = serde_json::from_str(json).unwrap();
        assert_eq!(option.modality, Modality::Mri);
        assert!(option.contrast);
        assert_eq!(option.name, "");
    }
}
