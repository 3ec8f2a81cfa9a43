// ============================================================================
// PulmoScan - Conversational Assistant
// ============================================================================
// One Gemini call per chat request; the SSE stream is a delivery format, not
// incremental generation. The system prompt is rebuilt on every call from the
// submitted patient and diagnosis context. Raw probability numbers are never
// injected into the conversation, only categorical labels.
// ============================================================================

use serde::Deserialize;
use serde_json::{json, Value};

use crate::gemini::errors::GeminiError;
use crate::gemini::models::{Content, Part};
use crate::gemini::GeminiClient;

use super::PatientInfo;

/// Longest slice of a prior narrative response carried into the prompt.
const MAX_ASSESSMENT_CHARS: usize = 1000;

const MODEL_ACK: &str = "Tôi hiểu vai trò của mình. Tôi là Trợ lý AI Y tế chuyên về Ung thư \
    Phổi, sẵn sàng hỗ trợ bạn với các câu hỏi về sức khỏe phổi và ung thư phổi. Tôi sẽ cung cấp \
    thông tin chính xác, an toàn và luôn khuyến khích bạn tham khảo ý kiến bác sĩ chuyên khoa \
    khi cần thiết.";

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatTurn>,
    #[serde(default)]
    pub patient_info: Option<PatientInfo>,
    /// Opaque prior diagnosis payload; only known keys are surfaced.
    #[serde(default)]
    pub diagnosis_result: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatTurn {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// Runs one chat exchange and renders it as SSE frames.
///
/// The frame list always ends with the `{"done": true}` marker, on success
/// and on failure alike; a failed generation shows up as an error-text frame
/// before it.
pub async fn chat_frames(client: &GeminiClient, request: &ChatRequest) -> Vec<String> {
    let contents = build_contents(request);

    let mut frames = Vec::with_capacity(2);
    match client.generate(contents).await {
        Ok(text) => frames.push(sse_frame(&json!({ "text": text }))),
        Err(GeminiError::MissingApiKey) => {
            frames.push(sse_frame(&json!({ "text": "Gemini API key not configured" })));
        }
        Err(e) => frames.push(sse_frame(&json!({ "text": format!("Error: {}", e) }))),
    }
    frames.push(sse_frame(&json!({ "done": true })));
    frames
}

pub fn sse_frame(payload: &Value) -> String {
    format!("data: {}\n\n", payload)
}

/// Full conversation: system prompt, fixed model acknowledgment, history,
/// then the current message.
pub fn build_contents(request: &ChatRequest) -> Vec<Content> {
    let mut contents = vec![
        Content::user(vec![Part::text(build_system_prompt(
            request.patient_info.as_ref(),
            request.diagnosis_result.as_ref(),
        ))]),
        Content::model(vec![Part::text(MODEL_ACK)]),
    ];

    for turn in &request.conversation_history {
        let content = Content {
            role: if turn.role == "user" { "user" } else { "model" }.to_string(),
            parts: vec![Part::text(turn.content.clone())],
        };
        contents.push(content);
    }

    contents.push(Content::user(vec![Part::text(request.message.clone())]));
    contents
}

pub fn build_system_prompt(patient: Option<&PatientInfo>, diagnosis: Option<&Value>) -> String {
    let mut prompt = String::from(
        "Bạn là **Trợ lý AI Y tế chuyên về Ung thư Phổi**.\n\
         \n\
         **CÁCH TRẢ LỜI:**\n\
         - **Cụ thể**: Trả lời trực tiếp câu hỏi, không nói chung chung\n\
         - **Ngắn gọn**: 2-3 câu chính, tránh dài dòng\n\
         - **Thân thiện**: Dễ hiểu, tránh thuật ngữ phức tạp\n\
         - **Tập trung**: Chỉ nói về vấn đề người dùng hỏi\n\
         \n\
         **NGUYÊN TẮC:**\n\
         1. Trả lời câu hỏi trước tiên\n\
         2. Nếu cần, thêm 1-2 lời khuyên liên quan\n\
         3. Luôn khuyến khích tham khảo bác sĩ\n\
         4. Không chẩn đoán, không kê đơn\n\
         \n\
         Hãy trả lời ngắn gọn, cụ thể và thân thiện.",
    );

    if let Some(patient) = patient {
        let high_risk = patient.abbreviated_risk_factors(3);
        let risk_line = if high_risk.is_empty() {
            "- Yếu tố nguy cơ: Bình thường".to_string()
        } else {
            format!("- Yếu tố nguy cơ cao: {}", high_risk.join(", "))
        };

        prompt.push_str(&format!(
            "\n\n**THÔNG TIN BỆNH NHÂN (Health Mode):**\n\
             - Tuổi: {}\n\
             - Giới tính: {}\n\
             {}\n\
             \n\
             Hãy xem xét thông tin bệnh nhân này khi trả lời câu hỏi.",
            patient.age_text(),
            patient.gender_text(),
            risk_line
        ));
    }

    if let Some(diagnosis) = diagnosis {
        let mut info = String::from("**KẾT QUẢ CHẨN ĐOÁN:**\n");

        if let Some(xgboost) = non_empty_object(diagnosis.get("xgboost_result")) {
            let risk_level = xgboost
                .get("risk_level")
                .and_then(Value::as_str)
                .unwrap_or("Không rõ");
            info.push_str(&format!("- Mức độ nguy cơ: {}\n", risk_level));
        }

        if let Some(tumor) = non_empty_object(diagnosis.get("tumor_result")) {
            let detected = tumor
                .get("has_tumor")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            info.push_str(&format!(
                "- Phát hiện u: {}\n",
                if detected { "Có" } else { "Không" }
            ));
        }

        // Stage labels under 20% confidence are too unreliable to mention.
        if let Some(stage) = non_empty_object(diagnosis.get("cancer_stage")) {
            let confidence = stage.get("confidence").and_then(Value::as_f64).unwrap_or(0.0);
            if confidence >= 0.2 {
                let label = stage.get("stage").and_then(Value::as_str).unwrap_or("Không rõ");
                info.push_str(&format!("- Phân loại: {}\n", label));
            }
        }

        let assessment: String = diagnosis
            .get("clinical_assessment")
            .and_then(Value::as_str)
            .unwrap_or("")
            .chars()
            .take(MAX_ASSESSMENT_CHARS)
            .collect();

        prompt.push_str(&format!(
            "\n\n{}\
             **NHẬN ĐỊNH LÂM SÀNG:**\n\
             {}\n\
             \n\
             Hãy sử dụng thông tin chẩn đoán này để cung cấp lời khuyên y tế phù hợp.",
            info, assessment
        ));
    }

    prompt
}

fn non_empty_object(value: Option<&Value>) -> Option<&serde_json::Map<String, Value>> {
    value.and_then(Value::as_object).filter(|o| !o.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt as _;

    fn request(body: Value) -> ChatRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn base_prompt_has_no_patient_section() {
        let prompt = build_system_prompt(None, None);
        assert!(prompt.contains("Trợ lý AI Y tế"));
        assert!(!prompt.contains("THÔNG TIN BỆNH NHÂN"));
        assert!(!prompt.contains("KẾT QUẢ CHẨN ĐOÁN"));
    }

    #[test]
    fn patient_factors_are_abbreviated() {
        let req = request(json!({
            "message": "hi",
            "patient_info": {"age": 60, "gender": 0,
                             "health_factors": {"genetic_risk": 7, "smoking": 8, "obesity": 2}}
        }));
        let prompt = build_system_prompt(req.patient_info.as_ref(), None);
        assert!(prompt.contains("- Giới tính: Nữ"));
        assert!(prompt.contains("Yếu tố nguy cơ cao: GR: 7/8, S: 8/8"));
    }

    #[test]
    fn low_confidence_stage_is_withheld() {
        let diagnosis = json!({
            "xgboost_result": {"risk_level": "High"},
            "tumor_result": {"has_tumor": true},
            "cancer_stage": {"stage": "Malignant", "confidence": 0.1},
            "clinical_assessment": "đánh giá"
        });
        let prompt = build_system_prompt(None, Some(&diagnosis));
        assert!(prompt.contains("- Mức độ nguy cơ: High"));
        assert!(prompt.contains("- Phát hiện u: Có"));
        assert!(!prompt.contains("- Phân loại:"));
    }

    #[test]
    fn confident_stage_is_surfaced_without_probability() {
        let diagnosis = json!({
            "cancer_stage": {"stage": "Benign", "confidence": 0.85}
        });
        let prompt = build_system_prompt(None, Some(&diagnosis));
        assert!(prompt.contains("- Phân loại: Benign"));
        assert!(!prompt.contains("0.85"));
    }

    #[test]
    fn long_assessment_is_truncated() {
        let diagnosis = json!({ "clinical_assessment": "x".repeat(5000) });
        let prompt = build_system_prompt(None, Some(&diagnosis));
        let xs = prompt.chars().filter(|&c| c == 'x').count();
        assert_eq!(xs, MAX_ASSESSMENT_CHARS);
    }

    #[test]
    fn history_roles_collapse_to_user_or_model() {
        let req = request(json!({
            "message": "tiếp theo",
            "conversation_history": [
                {"role": "user", "content": "câu hỏi"},
                {"role": "assistant", "content": "trả lời"}
            ]
        }));
        let contents = build_contents(&req);
        // system + ack + 2 history + current
        assert_eq!(contents.len(), 5);
        assert_eq!(contents[2].role, "user");
        assert_eq!(contents[3].role, "model");
        assert_eq!(contents[4].role, "user");
    }

    #[test]
    fn frames_always_terminate_with_done() {
        let client = GeminiClient::new(None, "gemini-2.0-flash");
        let req = request(json!({"message": "hi"}));
        let frames = chat_frames(&client, &req).now_or_never().unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].starts_with("data: "));
        assert!(frames[0].contains("Gemini API key not configured"));
        assert_eq!(frames[1], "data: {\"done\":true}\n\n");
    }
}
