//! Credit cost and usage-stat weights per generation type.
//!
//! Besides the credit price, each generation adds an estimate of storage
//! consumed and hours of manual work saved to the user's dashboard stats.

use std::collections::HashMap;

use crate::generation::GenerationType;

/// Credits charged for one image.
pub const IMAGE_CREDIT_COST: u32 = 1;
/// Credits charged for one video.
pub const VIDEO_CREDIT_COST: u32 = 5;
/// Credits charged for one CV.
pub const CV_CREDIT_COST: u32 = 2;
/// Credits charged for one piece of written content.
pub const CONTENT_CREDIT_COST: u32 = 2;

/// Cost and stat increments for a single generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationCost {
    /// Credits deducted from the balance.
    pub credits: u32,
    /// Storage added to `storage_used_mb`.
    pub storage_mb: f64,
    /// Hours added to `time_saved_hours`.
    pub time_saved_hours: f64,
}

impl GenerationCost {
    /// Look up the cost for a generation type.
    pub fn for_type(generation_type: GenerationType) -> Self {
        match generation_type {
            GenerationType::Image => Self {
                credits: IMAGE_CREDIT_COST,
                storage_mb: 2.5,
                time_saved_hours: 0.5,
            },
            GenerationType::Video => Self {
                credits: VIDEO_CREDIT_COST,
                storage_mb: 25.0,
                time_saved_hours: 2.0,
            },
            GenerationType::Cv => Self {
                credits: CV_CREDIT_COST,
                storage_mb: 0.1,
                time_saved_hours: 1.0,
            },
            GenerationType::Content => Self {
                credits: CONTENT_CREDIT_COST,
                storage_mb: 0.1,
                time_saved_hours: 1.0,
            },
        }
    }

    /// Metadata for the credit ledger entry.
    ///
    /// Keys produced: `credits`, `storage_mb`, `time_saved_hours`.
    pub fn to_metadata(&self) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert("credits".to_string(), self.credits.to_string());
        metadata.insert("storage_mb".to_string(), format!("{:.1}", self.storage_mb));
        metadata.insert(
            "time_saved_hours".to_string(),
            format!("{:.1}", self.time_saved_hours),
        );
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_prices() {
        assert_eq!(GenerationCost::for_type(GenerationType::Image).credits, 1);
        assert_eq!(GenerationCost::for_type(GenerationType::Video).credits, 5);
        assert_eq!(GenerationCost::for_type(GenerationType::Cv).credits, 2);
        assert_eq!(GenerationCost::for_type(GenerationType::Content).credits, 2);
    }

    #[test]
    fn test_video_is_most_expensive() {
        let video = GenerationCost::for_type(GenerationType::Video);
        for t in GenerationType::ALL {
            let c = GenerationCost::for_type(t);
            assert!(c.credits <= video.credits);
            assert!(c.storage_mb <= video.storage_mb);
        }
    }

    #[test]
    fn test_to_metadata() {
        let meta = GenerationCost::for_type(GenerationType::Image).to_metadata();
        assert_eq!(meta.get("credits").map(String::as_str), Some("1"));
        assert_eq!(meta.get("storage_mb").map(String::as_str), Some("2.5"));
        assert_eq!(meta.get("time_saved_hours").map(String::as_str), Some("0.5"));
    }
}
