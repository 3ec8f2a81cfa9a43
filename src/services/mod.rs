// ============================================================================
// PulmoScan - Clinical Text Services
// ============================================================================
// Everything downstream of the models: prompt assembly, recommendation
// synthesis (generative + deterministic), and the conversational assistant.
// All narrative output is Vietnamese, matching the served product.
// ============================================================================

pub mod chat;
pub mod fallback;
pub mod recommendations;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Patient profile as submitted by the frontend. Every field is optional;
/// formatting helpers substitute "Không rõ" (unknown) where data is missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientInfo {
    pub age: Option<i64>,
    /// 1 = male, 0 = female, anything else = unknown.
    pub gender: Option<i64>,
    #[serde(default)]
    pub health_factors: Map<String, Value>,
}

impl PatientInfo {
    pub fn age_text(&self) -> String {
        self.age
            .map(|a| a.to_string())
            .unwrap_or_else(|| "Không rõ".to_string())
    }

    pub fn gender_text(&self) -> &'static str {
        match self.gender {
            Some(1) => "Nam",
            Some(0) => "Nữ",
            _ => "Không rõ",
        }
    }

    /// Factors scoring >= 6 on the 8-point scale, formatted "Name: v/8" with
    /// the field name title-cased. Only high scorers are surfaced; this is
    /// context compression, not an omission.
    pub fn high_risk_factors(&self, limit: usize) -> Vec<String> {
        collect_high_risk(&self.health_factors, limit, title_case)
    }

    /// Same selection as `high_risk_factors` but with the factor name reduced
    /// to its initials ("genetic_risk" -> "GR") to keep chat prompts small.
    pub fn abbreviated_risk_factors(&self, limit: usize) -> Vec<String> {
        collect_high_risk(&self.health_factors, limit, abbreviate)
    }
}

/// Stage classification as echoed back by the frontend in recommendation and
/// chat requests. A missing or unlabeled classification reads as "Unknown".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageInput {
    pub predicted_class: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

impl StageInput {
    pub fn class_label(&self) -> &str {
        self.predicted_class.as_deref().unwrap_or("Unknown")
    }
}

fn collect_high_risk(
    factors: &Map<String, Value>,
    limit: usize,
    name_fmt: fn(&str) -> String,
) -> Vec<String> {
    factors
        .iter()
        .filter_map(|(name, value)| {
            let score = value.as_f64()?;
            if score >= 6.0 {
                Some(format!("{}: {}/8", name_fmt(name), format_score(value)))
            } else {
                None
            }
        })
        .take(limit)
        .collect()
}

/// Renders the raw JSON number without a trailing ".0" for integers.
fn format_score(value: &Value) -> String {
    match value.as_i64() {
        Some(i) => i.to_string(),
        None => value.as_f64().map(|f| f.to_string()).unwrap_or_default(),
    }
}

/// "genetic_risk" -> "Genetic Risk"
fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// "genetic_risk" -> "GR"
fn abbreviate(name: &str) -> String {
    name.split('_')
        .filter_map(|w| w.chars().next())
        .flat_map(|c| c.to_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patient(factors: &[(&str, Value)]) -> PatientInfo {
        let mut map = Map::new();
        for (k, v) in factors {
            map.insert(k.to_string(), v.clone());
        }
        PatientInfo {
            age: Some(65),
            gender: Some(1),
            health_factors: map,
        }
    }

    #[test]
    fn gender_codes_map_to_vietnamese_labels() {
        assert_eq!(PatientInfo { gender: Some(1), ..Default::default() }.gender_text(), "Nam");
        assert_eq!(PatientInfo { gender: Some(0), ..Default::default() }.gender_text(), "Nữ");
        assert_eq!(PatientInfo { gender: Some(7), ..Default::default() }.gender_text(), "Không rõ");
        assert_eq!(PatientInfo::default().gender_text(), "Không rõ");
    }

    #[test]
    fn only_scores_of_six_or_more_are_high_risk() {
        let p = patient(&[
            ("smoking", json!(8)),
            ("obesity", json!(5)),
            ("genetic_risk", json!(6)),
        ]);
        let factors = p.high_risk_factors(5);
        assert_eq!(factors, ["Smoking: 8/8", "Genetic Risk: 6/8"]);
    }

    #[test]
    fn non_numeric_factors_are_ignored() {
        let p = patient(&[("smoking", json!("heavy")), ("fatigue", json!(7))]);
        assert_eq!(p.high_risk_factors(5), ["Fatigue: 7/8"]);
    }

    #[test]
    fn factor_list_respects_the_cap() {
        let p = patient(&[
            ("a_one", json!(7)),
            ("b_two", json!(7)),
            ("c_three", json!(7)),
            ("d_four", json!(7)),
        ]);
        assert_eq!(p.high_risk_factors(3).len(), 3);
    }

    #[test]
    fn abbreviation_takes_initials() {
        let p = patient(&[("genetic_risk", json!(7)), ("coughing_of_blood", json!(8))]);
        assert_eq!(
            p.abbreviated_risk_factors(3),
            ["GR: 7/8", "COB: 8/8"]
        );
    }

    #[test]
    fn fractional_scores_keep_their_decimal() {
        let p = patient(&[("smoking", json!(6.5))]);
        assert_eq!(p.high_risk_factors(5), ["Smoking: 6.5/8"]);
    }

    #[test]
    fn missing_stage_reads_unknown() {
        assert_eq!(StageInput::default().class_label(), "Unknown");
    }
}
