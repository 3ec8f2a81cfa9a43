// ============================================================================
// PulmoScan - Deterministic Recommendation Strategy
// ============================================================================
// Last line of defense when the generative service is unavailable. Pure
// function of the request: no external calls, no randomness, byte-identical
// output for identical input. The Vietnamese templates mirror the generative
// format so frontends render both strategies the same way.
// ============================================================================

use super::recommendations::{DiagnosisSummary, RecommendationRequest, RecommendationResult};

/// Severity tier for template selection.
///
/// Precedence is fixed: a Malignant lesion forces the high tier even with a
/// Low risk label, and a Benign lesion forces at least the moderate tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    High,
    Moderate,
    Low,
}

pub fn select_tier(lung_cancer_label: &str, stage_class: &str) -> Tier {
    let risk = lung_cancer_label.to_lowercase();
    if risk == "high" || stage_class == "Malignant" {
        Tier::High
    } else if risk == "medium" || stage_class == "Benign" {
        Tier::Moderate
    } else {
        Tier::Low
    }
}

/// Builds the complete deterministic result. Never fails.
pub fn fallback_recommendations(request: &RecommendationRequest) -> RecommendationResult {
    let stage_class = request.cancer_stage.class_label();
    let tier = select_tier(&request.lung_cancer_label, stage_class);

    RecommendationResult {
        full_response: build_narrative(request, tier, stage_class),
        recommendations: fixed_recommendations(tier),
        diagnosis_summary: DiagnosisSummary {
            lung_cancer_label: request.lung_cancer_label.clone(),
            tumor_detected: request.tumor_detected,
        },
        fallback_used: true,
    }
}

fn build_narrative(request: &RecommendationRequest, tier: Tier, stage_class: &str) -> String {
    let patient = &request.patient_info;
    let age = patient.age_text();
    let gender = patient.gender_text();

    let key_factors = patient.high_risk_factors(5);
    let risk_line = if key_factors.is_empty() {
        "• Yếu tố nguy cơ: Trong giới hạn bình thường".to_string()
    } else {
        format!("• Yếu tố nguy cơ cao: {}", key_factors.join(", "))
    };

    let patient_section = format!(
        "**THÔNG TIN BỆNH NHÂN:**\n• Tuổi: {}\n• Giới tính: {}\n{}",
        age, gender, risk_line
    );

    let has_overlay = request
        .overlay_image
        .as_deref()
        .is_some_and(|s| !s.is_empty());

    let ai_analysis = if request.tumor_detected {
        format!(
            "\n• **Phát hiện vùng bất thường**: AI đã phát hiện và tô vùng bất thường trên hình \
             ảnh CT scan\n\
             • **Phân loại tổn thương**: {}\n\
             • **Đánh giá chuyên môn**: Vùng bất thường được phát hiện cần được đánh giá chi \
             tiết bởi bác sĩ chuyên khoa",
            if stage_class != "Unknown" {
                stage_class
            } else {
                "Chưa phân loại"
            }
        )
    } else {
        "\n• **Phát hiện vùng bất thường**: AI không phát hiện vùng bất thường rõ ràng trên hình \
         ảnh CT scan\n\
         • **Đánh giá chuyên môn**: Hình ảnh CT scan trong giới hạn bình thường, tuy nhiên cần \
         kết hợp với các yếu tố nguy cơ khác"
            .to_string()
    };

    let image_analysis = if request.tumor_detected && has_overlay {
        "\n\n**PHÂN TÍCH CHI TIẾT HÌNH ẢNH:**\n\
         • **Vị trí tổn thương**: Vùng bất thường được phát hiện và khoanh vùng trên hình ảnh \
         CT scan\n\
         • **Đặc điểm hình ảnh**: Tổn thương có ranh giới rõ ràng, cần đánh giá kỹ lưỡng về \
         kích thước, mật độ và mối liên hệ với các cấu trúc xung quanh\n\
         • **Khuyến cáo chuyên khoa**: Cần thực hiện các xét nghiệm bổ sung (CT liều cao, \
         PET-CT) để xác định bản chất tổn thương\n\
         • **Mức độ ưu tiên**: Cao - cần khám chuyên khoa trong 1-2 tuần"
    } else {
        ""
    };

    let ai_results_section = format!(
        "**KẾT QUẢ PHÂN TÍCH AI CHUYÊN NGHIỆP:**\n\
         • **Mô hình đánh giá nguy cơ ung thư phổi**: {}\n{}{}",
        request.lung_cancer_label, ai_analysis, image_analysis
    );

    let clinical_assessment = match tier {
        Tier::High => format!(
            "**NHẬN ĐỊNH LÂM SÀNG:**\n\
             • Bệnh nhân {gender}, {age} tuổi, có nguy cơ ung thư phổi **CAO** theo đánh giá \
             của AI\n\
             • {tumor_line}\n\
             • Phân loại tổn thương: {stage_line}\n\
             • Kết hợp thông tin lâm sàng, yếu tố nguy cơ, và kết quả AI cho thấy cần có kế \
             hoạch chẩn đoán và điều trị tích cực\n\
             • Ưu tiên khám chuyên khoa trong 1-2 tuần để đánh giá chi tiết và lập kế hoạch \
             can thiệp",
            gender = gender,
            age = age,
            tumor_line = if request.tumor_detected {
                "Phát hiện vùng bất thường trên CT scan cần đánh giá chi tiết"
            } else {
                "Chưa phát hiện vùng bất thường rõ ràng, nhưng yếu tố nguy cơ cao"
            },
            stage_line = if stage_class != "Unknown" {
                format!("{} - cần can thiệp tích cực", stage_class)
            } else {
                "Cần theo dõi sát sao".to_string()
            },
        ),
        Tier::Moderate => format!(
            "**NHẬN ĐỊNH LÂM SÀNG:**\n\
             • Bệnh nhân {gender}, {age} tuổi, có nguy cơ ung thư phổi ở mức **TRUNG BÌNH** \
             theo đánh giá của AI\n\
             • {tumor_line}\n\
             • Phân loại tổn thương: {stage_line}\n\
             • Cần kiểm soát các yếu tố nguy cơ để ngăn ngừa tiến triển\n\
             • Lên lịch khám chuyên khoa trong 4-6 tuần và theo dõi định kỳ",
            gender = gender,
            age = age,
            tumor_line = if request.tumor_detected {
                "Phát hiện vùng bất thường trên CT scan cần theo dõi"
            } else {
                "Hình ảnh CT scan chưa phát hiện vùng bất thường rõ ràng"
            },
            stage_line = if stage_class != "Unknown" {
                stage_class
            } else {
                "Cần theo dõi định kỳ"
            },
        ),
        Tier::Low => format!(
            "**NHẬN ĐỊNH LÂM SÀNG:**\n\
             • Bệnh nhân {gender}, {age} tuổi, có nguy cơ ung thư phổi **THẤP** theo đánh giá \
             của AI\n\
             • {tumor_line}\n\
             • Phân loại tổn thương: {stage_line}\n\
             • Nguy cơ thấp nhưng cần duy trì lối sống lành mạnh\n\
             • Khám sức khỏe định kỳ hàng năm và theo dõi triệu chứng",
            gender = gender,
            age = age,
            tumor_line = if !request.tumor_detected {
                "Hình ảnh CT scan không phát hiện vùng bất thường"
            } else {
                "Có phát hiện vùng bất thường nhưng"
            },
            stage_line = if stage_class != "Unknown" {
                stage_class
            } else {
                "Bình thường"
            },
        ),
    };

    let recommendations = match tier {
        Tier::High => {
            "**KHUYẾN NGHỊ Y KHOA:**\n\
             1. **Ưu tiên khám chuyên khoa hô hấp/ung bướu trong 1-2 tuần**\n\
             \u{20}  - Mục tiêu: Đánh giá toàn diện tình trạng và lập kế hoạch chẩn đoán chi tiết\n\
             \u{20}  - Chuẩn bị: Mang theo kết quả CT scan và các xét nghiệm đã thực hiện\n\
             \n\
             2. **Thực hiện CT ngực liều thấp có thuốc cản quang trong 2 tuần**\n\
             \u{20}  - Mục tiêu: Phát hiện các tổn thương nhỏ có thể bị bỏ sót\n\
             \u{20}  - Tần suất: Theo dõi định kỳ 3-6 tháng tùy theo kết quả\n\
             \n\
             3. **Xét nghiệm dấu ấn ung thư (CEA, CYFRA 21-1, NSE)**\n\
             \u{20}  - Mục tiêu: Hỗ trợ chẩn đoán và theo dõi điều trị\n\
             \u{20}  - Thời gian: Ngay trong tuần tới\n\
             \n\
             4. **Cai thuốc lá hoàn toàn và ngay lập tức**\n\
             \u{20}  - Mục tiêu: Giảm nguy cơ tiến triển và cải thiện hiệu quả điều trị\n\
             \u{20}  - Hỗ trợ: Tham gia chương trình cai thuốc lá tại bệnh viện\n\
             \n\
             5. **Theo dõi triệu chứng hô hấp hàng ngày**\n\
             \u{20}  - Các dấu hiệu cần chú ý: ho kéo dài, khó thở, đau ngực, ho ra máu\n\
             \u{20}  - Khám ngay nếu có triệu chứng bất thường"
        }
        Tier::Moderate => {
            "**KHUYẾN NGHỊ Y KHOA:**\n\
             1. **Khám chuyên khoa hô hấp trong 4-6 tuần**\n\
             \u{20}  - Mục tiêu: Đánh giá chi tiết và lập kế hoạch theo dõi dài hạn\n\
             \u{20}  - Chuẩn bị: Mang theo kết quả CT scan hiện tại\n\
             \n\
             2. **CT ngực kiểm tra sau 6 tháng**\n\
             \u{20}  - Mục tiêu: Theo dõi sự thay đổi của các tổn thương (nếu có)\n\
             \u{20}  - Tần suất: 6-12 tháng tùy theo kết quả\n\
             \n\
             3. **Giảm thiểu các yếu tố nguy cơ**\n\
             \u{20}  - Cai thuốc lá dần dần với hỗ trợ y tế\n\
             \u{20}  - Tránh môi trường ô nhiễm không khí\n\
             \u{20}  - Tăng cường chế độ ăn uống lành mạnh\n\
             \n\
             4. **Theo dõi triệu chứng định kỳ**\n\
             \u{20}  - Khám sức khỏe định kỳ 3-6 tháng\n\
             \u{20}  - Chú ý các triệu chứng hô hấp bất thường\n\
             \n\
             5. **Tăng cường sức khỏe tổng thể**\n\
             \u{20}  - Tập thể dục đều đặn, phù hợp với thể trạng\n\
             \u{20}  - Bổ sung vitamin và khoáng chất theo chỉ định"
        }
        Tier::Low => {
            "**KHUYẾN NGHỊ Y KHOA:**\n\
             1. **Khám sức khỏe định kỳ hàng năm**\n\
             \u{20}  - Mục tiêu: Theo dõi sức khỏe tổng thể và phát hiện sớm các vấn đề\n\
             \u{20}  - Bao gồm: Khám lâm sàng và X-quang ngực\n\
             \n\
             2. **Duy trì lối sống lành mạnh**\n\
             \u{20}  - Không hút thuốc lá và tránh khói thuốc thụ động\n\
             \u{20}  - Chế độ ăn giàu rau xanh, trái cây\n\
             \u{20}  - Tập thể dục đều đặn\n\
             \n\
             3. **Kiểm soát môi trường sống**\n\
             \u{20}  - Tránh tiếp xúc với các chất gây ung thư\n\
             \u{20}  - Sử dụng khẩu trang khi cần thiết\n\
             \u{20}  - Đảm bảo thông gió tốt trong nhà\n\
             \n\
             4. **Theo dõi triệu chứng**\n\
             \u{20}  - Chú ý các triệu chứng hô hấp bất thường\n\
             \u{20}  - Khám bác sĩ khi có ho kéo dài >2 tuần\n\
             \n\
             5. **CT ngực tầm soát sau 2-3 năm**\n\
             \u{20}  - Mục tiêu: Tầm soát định kỳ theo khuyến cáo\n\
             \u{20}  - Tần suất: 2-3 năm một lần hoặc theo chỉ định bác sĩ"
        }
    };

    let important_notes = "**LƯU Ý QUAN TRỌNG:**\n\
         • Kết quả này chỉ mang tính chất tham khảo, không thay thế cho ý kiến của bác sĩ \
         chuyên khoa\n\
         • Cần tuân thủ đúng lịch tái khám và theo dõi định kỳ\n\
         • Liên hệ ngay với bác sĩ nếu có bất kỳ triệu chứng bất thường nào\n\
         • Duy trì lối sống lành mạnh là yếu tố quan trọng nhất trong phòng ngừa ung thư";

    format!(
        "{}\n\n{}\n\n{}\n\n{}\n\n{}",
        patient_section, ai_results_section, clinical_assessment, recommendations, important_notes
    )
}

/// The fixed 5-item list for each tier, matching the numbered headings of the
/// narrative templates.
pub fn fixed_recommendations(tier: Tier) -> Vec<String> {
    let items: [&str; 5] = match tier {
        Tier::High => [
            "**Ưu tiên khám chuyên khoa hô hấp/ung bướu trong 1-2 tuần**",
            "Thực hiện CT ngực liều thấp có thuốc cản quang trong 2 tuần",
            "Xét nghiệm dấu ấn ung thư (CEA, CYFRA 21-1, NSE)",
            "Cai thuốc lá hoàn toàn và ngay lập tức",
            "Theo dõi triệu chứng hô hấp hàng ngày",
        ],
        Tier::Moderate => [
            "**Khám chuyên khoa hô hấp trong 4-6 tuần**",
            "CT ngực kiểm tra sau 6 tháng",
            "Giảm thiểu các yếu tố nguy cơ",
            "Theo dõi triệu chứng định kỳ",
            "Tăng cường sức khỏe tổng thể",
        ],
        Tier::Low => [
            "**Khám sức khỏe định kỳ hàng năm**",
            "Duy trì lối sống lành mạnh",
            "Kiểm soát môi trường sống",
            "Theo dõi triệu chứng",
            "CT ngực tầm soát sau 2-3 năm",
        ],
    };
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(label: &str, stage: &str, tumor: bool) -> RecommendationRequest {
        serde_json::from_value(json!({
            "lung_cancer_label": label,
            "tumor_detected": tumor,
            "cancer_stage": {"predicted_class": stage, "confidence": 0.85},
            "patient_info": {"age": 65, "gender": 1,
                             "health_factors": {"smoking": 8, "genetic_risk": 7}}
        }))
        .unwrap()
    }

    #[test]
    fn tier_precedence_covers_full_matrix() {
        let expected = [
            ("Low", "Benign", Tier::Moderate),
            ("Low", "Malignant", Tier::High),
            ("Low", "Normal", Tier::Low),
            ("Low", "Unknown", Tier::Low),
            ("Medium", "Benign", Tier::Moderate),
            ("Medium", "Malignant", Tier::High),
            ("Medium", "Normal", Tier::Moderate),
            ("Medium", "Unknown", Tier::Moderate),
            ("High", "Benign", Tier::High),
            ("High", "Malignant", Tier::High),
            ("High", "Normal", Tier::High),
            ("High", "Unknown", Tier::High),
        ];
        for (label, stage, tier) in expected {
            assert_eq!(select_tier(label, stage), tier, "{} / {}", label, stage);
        }
    }

    #[test]
    fn result_is_deterministic() {
        let req = request("High", "Malignant", true);
        let a = fallback_recommendations(&req);
        let b = fallback_recommendations(&req);
        assert_eq!(a.full_response, b.full_response);
        assert_eq!(a.recommendations, b.recommendations);
    }

    #[test]
    fn high_tier_scenario_matches_contract() {
        let result = fallback_recommendations(&request("High", "Malignant", true));
        assert!(result.fallback_used);
        assert_eq!(result.recommendations.len(), 5);
        assert!(result.recommendations[0].contains("Ưu tiên"));
        assert!(result.full_response.contains("**CAO**"));
        assert!(result.full_response.contains("Malignant - cần can thiệp tích cực"));
        assert_eq!(result.diagnosis_summary.lung_cancer_label, "High");
        assert!(result.diagnosis_summary.tumor_detected);
    }

    #[test]
    fn every_tier_yields_exactly_five_recommendations() {
        for tier in [Tier::High, Tier::Moderate, Tier::Low] {
            assert_eq!(fixed_recommendations(tier).len(), 5);
        }
    }

    #[test]
    fn low_tier_without_tumor_reads_normal() {
        let result = fallback_recommendations(&request("Low", "Normal", false));
        assert!(result.full_response.contains("**THẤP**"));
        assert!(result
            .full_response
            .contains("Hình ảnh CT scan không phát hiện vùng bất thường"));
    }

    #[test]
    fn empty_factors_read_within_normal_limits() {
        let req: RecommendationRequest = serde_json::from_value(json!({
            "lung_cancer_label": "Low",
            "tumor_detected": false,
            "patient_info": {"age": 50, "gender": 0}
        }))
        .unwrap();
        let result = fallback_recommendations(&req);
        assert!(result
            .full_response
            .contains("• Yếu tố nguy cơ: Trong giới hạn bình thường"));
        assert!(!result.full_response.contains("Yếu tố nguy cơ cao"));
        assert!(result.full_response.contains("**THẤP**"));
        assert_eq!(result.recommendations.len(), 5);
    }

    #[test]
    fn image_analysis_needs_tumor_and_overlay() {
        let mut req = request("High", "Malignant", true);
        req.overlay_image = Some("data:image/png;base64,QUJD".into());
        let with_overlay = fallback_recommendations(&req);
        assert!(with_overlay
            .full_response
            .contains("**PHÂN TÍCH CHI TIẾT HÌNH ẢNH:**"));

        req.overlay_image = None;
        let without = fallback_recommendations(&req);
        assert!(!without
            .full_response
            .contains("**PHÂN TÍCH CHI TIẾT HÌNH ẢNH:**"));
    }
}
