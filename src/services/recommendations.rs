// ============================================================================
// PulmoScan - Generative Recommendation Strategy
// ============================================================================
// Builds the oncologist prompt, calls Gemini once (single turn, no stream),
// and parses the response into the capped recommendation list. Any failure is
// returned to the caller, which substitutes the deterministic strategy.
// ============================================================================

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::gemini::errors::GeminiResult;
use crate::gemini::models::{Content, Part};
use crate::gemini::GeminiClient;
use crate::imaging;

use super::{PatientInfo, StageInput};

/// Body of `POST /api/recommendations`. Everything defaults so that a bare
/// `{}` still synthesizes a (low-risk) result.
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default = "default_label")]
    pub lung_cancer_label: String,
    #[serde(default)]
    pub tumor_detected: bool,
    #[serde(default)]
    pub cancer_stage: StageInput,
    #[serde(default)]
    pub patient_info: PatientInfo,
    #[serde(default)]
    pub overlay_image: Option<String>,
}

fn default_label() -> String {
    "Low".to_string()
}

impl RecommendationRequest {
    fn has_overlay(&self) -> bool {
        self.overlay_image.as_deref().is_some_and(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationResult {
    pub full_response: String,
    pub recommendations: Vec<String>,
    pub diagnosis_summary: DiagnosisSummary,
    pub fallback_used: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisSummary {
    pub lung_cancer_label: String,
    pub tumor_detected: bool,
}

/// Runs the generative strategy end to end.
pub async fn generate_recommendations(
    client: &GeminiClient,
    request: &RecommendationRequest,
    max_recommendations: usize,
) -> GeminiResult<RecommendationResult> {
    let mut parts = vec![Part::text(build_prompt(request))];

    if request.tumor_detected {
        if let Some(overlay) = request.overlay_image.as_deref().filter(|s| !s.is_empty()) {
            // A broken overlay must not sink the whole request; the prompt
            // simply goes out without the image.
            match imaging::data_url_to_bytes(overlay) {
                Ok(bytes) => {
                    parts.push(Part::inline_png(BASE64.encode(bytes)));
                    parts.push(Part::text(
                        "\n\nHãy phân tích chi tiết hình ảnh CT scan được khoanh vùng này. \
                         Mô tả vị trí, kích thước, đặc điểm của vùng bất thường được phát hiện.",
                    ));
                }
                Err(e) => warn!("[Recommendations] Skipping overlay image: {}", e),
            }
        }
    }

    let full_response = client.generate(vec![Content::user(parts)]).await?;
    let recommendations = extract_recommendations(&full_response, max_recommendations);

    Ok(RecommendationResult {
        recommendations,
        full_response,
        diagnosis_summary: DiagnosisSummary {
            lung_cancer_label: request.lung_cancer_label.clone(),
            tumor_detected: request.tumor_detected,
        },
        fallback_used: false,
    })
}

/// Vietnamese oncologist system prompt with patient context and AI findings.
pub fn build_prompt(request: &RecommendationRequest) -> String {
    let patient = &request.patient_info;
    let key_factors = patient.high_risk_factors(5);
    let risk_line = if key_factors.is_empty() {
        "• Yếu tố nguy cơ: Trong giới hạn bình thường".to_string()
    } else {
        format!("• Yếu tố nguy cơ cao: {}", key_factors.join(", "))
    };

    let stage_class = request.cancer_stage.class_label();
    let stage_line = if stage_class != "Unknown" {
        stage_class
    } else {
        "Chưa phân loại"
    };

    let ct_line = if request.tumor_detected {
        "Có phát hiện vùng bất thường"
    } else {
        "Không phát hiện vùng bất thường"
    };

    let image_line = if request.has_overlay() && request.tumor_detected {
        "• **Hình ảnh CT scan**: Đã được AI phát hiện và tô vùng bất thường - Hãy phân tích hình \
         ảnh theo chuyên ngành y tế và đưa ra nhận xét chuyên nghiệp về vị trí, kích thước, đặc \
         điểm của vùng bất thường"
    } else {
        "• **Hình ảnh CT scan**: Không phát hiện vùng bất thường rõ ràng"
    };

    format!(
        "Bạn là **bác sĩ chuyên khoa ung bướu – chuyên về ung thư phổi**, có hơn 15 năm kinh \
         nghiệm lâm sàng trong chẩn đoán và điều trị các bệnh lý hô hấp ác tính.\n\
         Phân tích TỔNG HỢP tất cả thông tin để đưa ra nhận định và chỉ định y tế có giá trị \
         thực hành.\n\
         \n\
         THÔNG TIN BỆNH NHÂN:\n\
         • Tuổi: {age}\n\
         • Giới tính: {gender}\n\
         {risk_line}\n\
         \n\
         KẾT QUẢ PHÂN TÍCH AI CHUYÊN NGHIỆP:\n\
         • **Mô hình đánh giá nguy cơ ung thư phổi**: {label}\n\
         • **Phân tích hình ảnh CT scan**: {ct_line}\n\
         • **Phân loại tổn thương**: {stage_line}\n\
         {image_line}\n\
         \n\
         NGUYÊN TẮC LÂM SÀNG:\n\
         - Kết hợp thông tin bệnh nhân, yếu tố nguy cơ, kết quả AI và hình ảnh để đưa ra quyết \
         định lâm sàng.\n\
         - Đưa ra khuyến nghị có **giá trị sử dụng thực tế**, rõ **thời gian – tần suất – \
         phương pháp**.\n\
         - Mỗi khuyến nghị phải **có mục tiêu y khoa rõ ràng**: chẩn đoán xác định, theo dõi, \
         hoặc can thiệp sớm.\n\
         - Ngôn ngữ phải thể hiện phong cách của **một bác sĩ đang ra chỉ định cho bệnh nhân**, \
         không chung chung hay mơ hồ.\n\
         \n\
         YÊU CẦU ĐỊNH DẠNG:\n\
         **NHẬN ĐỊNH LÂM SÀNG:**\n\
         [Phân tích tổng hợp tình trạng bệnh nhân dựa trên tất cả thông tin]\n\
         \n\
         **KHUYẾN NGHỊ Y KHOA:**\n\
         [Danh sách khuyến nghị cụ thể với thời gian và phương pháp rõ ràng]\n\
         \n\
         **LƯU Ý QUAN TRỌNG:**\n\
         [Các lưu ý đặc biệt cho bệnh nhân]",
        age = patient.age_text(),
        gender = patient.gender_text(),
        risk_line = risk_line,
        label = request.lung_cancer_label,
        ct_line = ct_line,
        stage_line = stage_line,
        image_line = image_line,
    )
}

/// Scans the response for the recommendations section and collects bulleted
/// lines out of it.
///
/// The section boundaries are recognized by substring markers, so this parser
/// is intentionally tolerant of surrounding formatting but strict about
/// order: collection starts after a line mentioning "KHUYẾN NGHỊ" and stops
/// at the first subsequent "LƯU Ý" or "NHẬN ĐỊNH" line.
pub fn extract_recommendations(response_text: &str, max: usize) -> Vec<String> {
    const BULLETS: [&str; 8] = ["1.", "2.", "3.", "4.", "5.", "-", "•", "*"];

    let mut recommendations = Vec::new();
    let mut in_section = false;

    for line in response_text.lines() {
        let line = line.trim();
        let upper = line.to_uppercase();

        if upper.contains("KHUYẾN NGHỊ") {
            in_section = true;
            continue;
        }
        if upper.contains("LƯU Ý") || upper.contains("NHẬN ĐỊNH") {
            if in_section {
                break;
            }
            continue;
        }
        if in_section && !line.is_empty() && BULLETS.iter().any(|b| line.starts_with(b)) {
            recommendations.push(line.to_string());
            if recommendations.len() >= max {
                break;
            }
        }
    }

    recommendations
}
