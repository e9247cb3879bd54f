//! Tests for the SSE decoder

use super::*;

#[test]
fn test_single_frame() {
    let mut decoder = SseDecoder::new();
    let frames = decoder.feed(b"data: {\"a\":1}\n\n");

    assert_eq!(frames, vec![SseFrame::data("{\"a\":1}")]);
    assert!(!decoder.has_pending());
}

#[test]
fn test_frame_split_across_chunks() {
    let mut decoder = SseDecoder::new();

    assert!(decoder.feed(b"event: delta\ndata: {\"te").is_empty());
    assert!(decoder.feed(b"xt\":\"hi\"}\n").is_empty());
    let frames = decoder.feed(b"\n");

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].event.as_deref(), Some("delta"));
    assert_eq!(frames[0].data, "{\"text\":\"hi\"}");
}

#[test]
fn test_utf8_split_across_chunks() {
    let mut decoder = SseDecoder::new();
    let bytes = "data: naïve 中文\n\n".as_bytes();
    // Split inside the three-byte encoding of '中'
    let split = bytes.iter().position(|b| *b == 0xE4).unwrap() + 1;

    assert!(decoder.feed(&bytes[..split]).is_empty());
    let frames = decoder.feed(&bytes[split..]);
    assert_eq!(frames[0].data, "naïve 中文");
}

#[test]
fn test_crlf_and_comments() {
    let mut decoder = SseDecoder::new();
    let frames = decoder.feed(b": keepalive\r\n\r\ndata: one\r\n\r\n: ping\n\ndata: two\n\n");

    let data: Vec<&str> = frames.iter().map(|f| f.data.as_str()).collect();
    assert_eq!(data, vec!["one", "two"]);
}

#[test]
fn test_multi_line_data() {
    let mut decoder = SseDecoder::new();
    let frames = decoder.feed(b"data: line1\ndata: line2\n\n");
    assert_eq!(frames[0].data, "line1\nline2");
}

#[test]
fn test_done_sentinel() {
    let mut decoder = SseDecoder::new();
    let frames = decoder.feed(b"data: [DONE]\n\n");
    assert!(frames[0].is_done());
}

#[test]
fn test_finish_flushes_unterminated_frame() {
    let mut decoder = SseDecoder::new();
    assert!(decoder.feed(b"data: tail").is_empty());
    assert!(decoder.has_pending());

    assert_eq!(decoder.finish(), Some(SseFrame::data("tail")));
    assert_eq!(decoder.finish(), None);
}

#[test]
fn test_unknown_fields_ignored() {
    let mut decoder = SseDecoder::new();
    let frames = decoder.feed(b"id: 7\nretry: 1000\ndata: x\n\n");
    assert_eq!(frames, vec![SseFrame::data("x")]);
}
