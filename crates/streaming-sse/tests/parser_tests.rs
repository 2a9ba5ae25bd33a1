use crate::sse_streaming::{parse_block, parse_block_bytes, render_block};

#[test]
fn test_event_name_and_multiline_data() {
    let event = parse_block("event: put\ndata:123\ndata: 456\n");
    assert_eq!(event.event_name(), "put");
    assert_eq!(event.data(), "123\n456\n");
}

#[test]
fn test_comment_and_unknown_field_are_ignored() {
    let event = parse_block(":comment\ndata:  short\nignored: field");
    assert_eq!(event.event_name(), "message");
    assert_eq!(event.data(), " short\n");
}

#[test]
fn test_comment_only_block_is_default_event() {
    let event = parse_block(": keep-alive");
    assert_eq!(event.event_name(), "message");
    assert_eq!(event.data(), "");
}

#[test]
fn test_empty_block_is_default_event() {
    let event = parse_block("");
    assert_eq!(event.event_name(), "message");
    assert_eq!(event.data(), "");
}

#[test]
fn test_last_event_name_wins() {
    let event = parse_block("event: first\nevent:second\ndata: x");
    assert_eq!(event.event_name(), "second");
    assert_eq!(event.data(), "x\n");
}

#[test]
fn test_every_line_ending_style() {
    let lf = parse_block("event: e\ndata: a\ndata: b");
    let crlf = parse_block("event: e\r\ndata: a\r\ndata: b");
    let cr = parse_block("event: e\rdata: a\rdata: b");
    assert_eq!(lf, crlf);
    assert_eq!(lf, cr);
    assert_eq!(lf.data(), "a\nb\n");
}

#[test]
fn test_field_names_need_colon() {
    let event = parse_block("data\nevent\nretry: 10\nid: 7");
    assert_eq!(event.event_name(), "message");
    assert_eq!(event.data(), "");
}

#[test]
fn test_empty_data_line_contributes_newline() {
    let event = parse_block("data:\ndata");
    assert_eq!(event.data(), "\n");
}

#[test]
fn test_parsing_is_pure() {
    let block = "event: tick\ndata: {\"n\":1}";
    assert_eq!(parse_block(block), parse_block(block));
}

#[test]
fn test_invalid_utf8_is_replaced() {
    let event = parse_block_bytes(b"data: \xff\xfeok");
    assert_eq!(event.data(), "\u{fffd}\u{fffd}ok\n");
}

#[test]
fn test_reparsing_rendered_block_is_idempotent() {
    for block in [
        "event: put\ndata:123\ndata: 456\n",
        ":comment\ndata:  short\nignored: field",
        "data:\ndata: x",
        ": only a comment",
        "event: update",
    ] {
        let event = parse_block(block);
        let reparsed = parse_block(&render_block(&event));
        assert_eq!(event, reparsed, "block: {block:?}");
    }
}
