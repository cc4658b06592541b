use serde::Serialize;

/// 聊天正文片段：普通文本或金额
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum BodySegment {
    Text(String),
    /// 金额数字（不含 `$`）
    Amount(String),
}

/// 超过两位的连续数字视为金额
const MIN_AMOUNT_DIGITS: usize = 3;

/// 为正文中的金额补上 `$` 前缀
///
/// 连续 3 位及以上的数字，若前面没有 `$`，则插入 `$`；已带 `$` 的保持不变，
/// 因此该操作幂等。
pub fn normalize_currency_tokens(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 4);
    let mut digits = String::new();
    let mut prev: Option<char> = None;
    let mut run_prefixed = false;

    for ch in body.chars() {
        if ch.is_ascii_digit() {
            if digits.is_empty() {
                run_prefixed = prev == Some('$');
            }
            digits.push(ch);
        } else {
            flush_digits(&mut out, &mut digits, run_prefixed);
            out.push(ch);
        }
        prev = Some(ch);
    }
    flush_digits(&mut out, &mut digits, run_prefixed);
    out
}

fn flush_digits(out: &mut String, digits: &mut String, prefixed: bool) {
    if digits.is_empty() {
        return;
    }
    if !prefixed && digits.len() >= MIN_AMOUNT_DIGITS {
        out.push('$');
    }
    out.push_str(digits);
    digits.clear();
}

/// 将正文切分为文本与金额片段，供客户端高亮金额
///
/// 只有 `$` 紧跟数字的位置才被识别为金额，先调用
/// [`normalize_currency_tokens`] 可得到完整的金额标注。
pub fn body_segments(body: &str) -> Vec<BodySegment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = body.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek().is_some_and(|c| c.is_ascii_digit()) {
            let mut amount = String::new();
            while let Some(d) = chars.peek().copied().filter(|c| c.is_ascii_digit()) {
                amount.push(d);
                chars.next();
            }
            if !text.is_empty() {
                segments.push(BodySegment::Text(std::mem::take(&mut text)));
            }
            segments.push(BodySegment::Amount(amount));
        } else {
            text.push(ch);
        }
    }

    if !text.is_empty() {
        segments.push(BodySegment::Text(text));
    }
    segments
}
