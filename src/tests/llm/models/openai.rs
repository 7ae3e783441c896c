use crate::llm::chat::transcript::Turn;
use crate::llm::models::openai::{
    chat_completions_url_candidates, chunk_from_stream_json, create_lmstudio,
    extract_sse_frame_from_buffer, response_from_json, sse_data_from_frame, usage_from_response,
    OpenAiClient,
};
use crate::llm::models::provider_base::GenerationParams;
use serde_json::json;

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GenerationParams {
        GenerationParams { temperature: 0.5, max_tokens: 256 }
    }

    #[test]
    fn sse_data_from_frame_supports_data_without_space() {
        let frame = "data:{\"x\":1}\n";
        let data = sse_data_from_frame(frame).expect("should extract data");
        assert_eq!(data, "{\"x\":1}");
    }

    #[test]
    fn sse_data_from_frame_joins_multiple_data_lines() {
        let frame = "event: message\ndata: a\ndata: b\n";
        let data = sse_data_from_frame(frame).expect("should extract data");
        assert_eq!(data, "a\nb");
    }

    #[test]
    fn extract_sse_frame_from_buffer_handles_crlf_delimiter() {
        let mut buffer = b"data: 1\r\n\r\ndata: 2\r\n\r\n".to_vec();

        let frame1 = extract_sse_frame_from_buffer(&mut buffer).expect("frame1");
        let data1 = sse_data_from_frame(&String::from_utf8_lossy(&frame1)).expect("data1");
        assert_eq!(data1, "1");

        let frame2 = extract_sse_frame_from_buffer(&mut buffer).expect("frame2");
        let data2 = sse_data_from_frame(&String::from_utf8_lossy(&frame2)).expect("data2");
        assert_eq!(data2, "2");
    }

    #[test]
    fn extract_sse_frame_from_buffer_handles_lf_delimiter() {
        let mut buffer = b"data: 1\n\ndata: 2\n\n".to_vec();

        let frame1 = extract_sse_frame_from_buffer(&mut buffer).expect("frame1");
        let data1 = sse_data_from_frame(&String::from_utf8_lossy(&frame1)).expect("data1");
        assert_eq!(data1, "1");

        let frame2 = extract_sse_frame_from_buffer(&mut buffer).expect("frame2");
        let data2 = sse_data_from_frame(&String::from_utf8_lossy(&frame2)).expect("data2");
        assert_eq!(data2, "2");
    }

    #[test]
    fn chunk_from_stream_json_reads_delta_content() {
        let v = json!({
            "choices": [{ "delta": { "content": "Hel" } }]
        });
        let chunk = chunk_from_stream_json(&v);
        assert_eq!(chunk.text, "Hel");
        assert!(chunk.usage.is_none());
        assert!(!chunk.is_complete);
    }

    #[test]
    fn chunk_from_stream_json_reads_usage_only_frame() {
        let v = json!({
            "choices": [],
            "usage": { "prompt_tokens": 12, "completion_tokens": 34, "total_tokens": 46 }
        });
        let chunk = chunk_from_stream_json(&v);
        assert!(chunk.text.is_empty());
        let usage = chunk.usage.expect("usage");
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(34));
        assert_eq!(usage.total_tokens, Some(46));
    }

    #[test]
    fn usage_from_response_ignores_null_usage() {
        let v = json!({ "usage": null });
        assert!(usage_from_response(&v).is_none());
    }

    #[test]
    fn response_from_json_reads_message_content() {
        let v = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Hello" } }],
            "usage": { "prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4 }
        });
        let response = response_from_json(&v).expect("response");
        assert_eq!(response.text, "Hello");
        assert_eq!(response.usage.expect("usage").total_tokens, Some(4));
    }

    #[test]
    fn response_from_json_fails_without_content() {
        let v = json!({ "choices": [] });
        assert!(response_from_json(&v).is_err());
    }

    #[test]
    fn url_candidates_cover_bases_with_and_without_v1() {
        let candidates = chat_completions_url_candidates("http://localhost:1234/");
        assert_eq!(
            candidates,
            vec![
                "http://localhost:1234/chat/completions".to_string(),
                "http://localhost:1234/v1/chat/completions".to_string(),
            ]
        );
    }

    #[test]
    fn request_body_carries_generation_params() {
        let client = OpenAiClient::new(
            "https://api.openai.com/v1".to_string(),
            "sk-test".to_string(),
            "gpt-4o-mini".to_string(),
            params(),
        );
        let turns = vec![Turn::system("be brief"), Turn::user("hi")];
        let body = client.request_body(&turns, true);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn blocking_request_body_omits_stream_options() {
        let client = create_lmstudio(
            "http://localhost:1234".to_string(),
            "local-model".to_string(),
            params(),
        );
        let body = client.request_body(&[Turn::user("hi")], false);

        assert_eq!(body["stream"], false);
        assert!(body.get("stream_options").is_none());
        assert!(client.api_key.is_empty());
    }
}
