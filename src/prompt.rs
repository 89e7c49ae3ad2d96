//! System prompt assembly for the travel advisor
//!
//! The advisor persona is fixed; the user's itinerary (when the file has
//! content) is appended so answers can reference concrete dates, the hotel,
//! and flight times.

const ADVISOR_PROMPT: &str = "你是一位專為計劃前往東京市區旅遊的台灣遊客提供協助的 AI 旅遊顧問。請務必使用繁體中文回答。你的回答應該友善、口語化、實用，並且盡可能包含當地人才知道的實用秘訣或建議。\n當你提到一個明確的地點、地標、車站、公園、餐廳、商店或區域時，請用雙中括號將其包起來，例如：`[[東京晴空塔]]` 或 `[[新宿御苑]]` 或 `[[澀谷站]]` 或 `[[一蘭拉麵 新宿店]]`。這樣使用者可以快速識別重要的地點資訊。\n\n請針對以下主題提供建議：\n- 交通方式與路線規劃\n- 美食推薦（包括平價選擇）\n- 購物地點與商品\n- 觀光景點與活動\n- 住宿建議\n- 實用的旅遊小撇步\n- 文化禮儀與注意事項\n- 當地生活體驗\n\n如果使用者詢問東京以外的地區，請友善地提醒你專精於東京市區旅遊，並建議他們將問題聚焦在東京相關內容上。";

const JOURNEY_PREFIX: &str =
    "\n\n**重要：以下是用戶的詳細行程資訊，請仔細閱讀並在回答時參考這些資訊：**\n\n";

const JOURNEY_SUFFIX: &str = "\n\n請根據用戶的具體行程安排（包括日期、住宿飯店、航班時間、已規劃的景點等）來提供個人化的建議。特別注意：\n- 根據用戶的住宿位置推薦附近的景點和餐廳\n- 考慮用戶的航班時間和行程安排\n- 參考用戶已規劃的景點，避免重複推薦\n- 根據用戶的興趣和已列出的偏好提供建議\n- 如果用戶詢問的景點或時間與行程衝突，請主動提醒";

/// Build the session system prompt, embedding the itinerary when present.
pub fn build_system_prompt(journey: &str) -> String {
    let mut prompt = ADVISOR_PROMPT.to_string();

    if !journey.trim().is_empty() {
        prompt.push_str(JOURNEY_PREFIX);
        prompt.push_str(journey);
        prompt.push_str(JOURNEY_SUFFIX);
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_without_journey() {
        let prompt = build_system_prompt("");
        assert!(prompt.contains("AI 旅遊顧問"));
        assert!(!prompt.contains("行程資訊"));
    }

    #[test]
    fn test_prompt_whitespace_journey_is_ignored() {
        let prompt = build_system_prompt("  \n  ");
        assert!(!prompt.contains("行程資訊"));
    }

    #[test]
    fn test_prompt_embeds_journey() {
        let prompt = build_system_prompt("9/12(五)\n淺草豪景酒店");
        assert!(prompt.contains("淺草豪景酒店"));
        assert!(prompt.contains("個人化的建議"));
        // Persona comes first, itinerary after
        let persona_pos = prompt.find("AI 旅遊顧問").unwrap();
        let journey_pos = prompt.find("9/12(五)").unwrap();
        assert!(persona_pos < journey_pos);
    }
}
