//! Context window trimming.

use docassist_core::message::Message;

/// Keep the most recent turns whose combined content fits in `max_chars`.
///
/// Walks newest → oldest and stops at the first turn that would push the
/// total over budget; turns are never split. The result is in
/// chronological order. A shorter result than the input means the history
/// overflowed the budget.
pub fn trim_messages(messages: &[Message], max_chars: usize) -> Vec<Message> {
    let mut total = 0usize;
    let mut keep_from = messages.len();

    for (i, msg) in messages.iter().enumerate().rev() {
        let len = msg.char_len();
        if total + len > max_chars {
            break;
        }
        total += len;
        keep_from = i;
    }

    messages[keep_from..].to_vec()
}
