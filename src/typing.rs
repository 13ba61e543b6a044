use crate::layout::PlacedBubble;

/// Index of the first real (non-typing) bubble after `index` from the same sender.
pub fn next_real_message(bubbles: &[PlacedBubble], index: usize) -> Option<usize> {
    let sender = bubbles.get(index)?.bubble.sender;
    let mut cursor = index + 1;
    while cursor < bubbles.len() {
        let candidate = &bubbles[cursor].bubble;
        if !candidate.is_typing && candidate.sender == sender {
            return Some(cursor);
        }
        cursor += 1;
    }
    None
}

/// Bubbles shown once messages `0..=state` have arrived, ascending. A typing
/// placeholder disappears as soon as its sender's next real message is in.
pub fn visible_indices(bubbles: &[PlacedBubble], state: usize) -> Vec<usize> {
    if bubbles.is_empty() {
        return Vec::new();
    }
    let last = state.min(bubbles.len() - 1);

    (0..=last)
        .filter(|&index| {
            if !bubbles[index].bubble.is_typing {
                return true;
            }
            match next_real_message(bubbles, index) {
                Some(real) => real > state,
                None => true,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::layout;
    use crate::message::{Message, Sender};
    use crate::style::ChatStyle;
    use crate::text::MonospaceMeasurer;

    fn plan(messages: &[Message]) -> Vec<PlacedBubble> {
        layout(messages, &ChatStyle::default(), &MonospaceMeasurer::default())
            .unwrap()
            .bubbles()
            .to_vec()
    }

    #[test]
    fn typing_is_superseded_once_real_message_arrives() {
        let bubbles = plan(&[
            Message::typing(Sender::Sender),
            Message::typing(Sender::Sender),
            Message::text(Sender::Sender, "here"),
            Message::text(Sender::Receiver, "ok"),
        ]);

        assert_eq!(visible_indices(&bubbles, 0), vec![0]);
        assert_eq!(visible_indices(&bubbles, 1), vec![0, 1]);
        assert_eq!(visible_indices(&bubbles, 2), vec![2]);
        assert_eq!(visible_indices(&bubbles, 3), vec![2, 3]);
    }

    #[test]
    fn other_sender_does_not_suppress_typing() {
        let bubbles = plan(&[
            Message::typing(Sender::Receiver),
            Message::text(Sender::Sender, "you there?"),
            Message::text(Sender::Receiver, "yes"),
        ]);

        assert_eq!(visible_indices(&bubbles, 1), vec![0, 1]);
        assert_eq!(visible_indices(&bubbles, 2), vec![1, 2]);
        assert_eq!(next_real_message(&bubbles, 0), Some(2));
    }

    #[test]
    fn typing_without_follow_up_stays_visible() {
        let bubbles = plan(&[
            Message::text(Sender::Receiver, "so?"),
            Message::typing(Sender::Sender),
        ]);
        assert_eq!(visible_indices(&bubbles, 1), vec![0, 1]);
        assert_eq!(next_real_message(&bubbles, 1), None);
    }

    #[test]
    fn state_past_end_is_clamped() {
        let bubbles = plan(&[Message::text(Sender::Receiver, "hi")]);
        assert_eq!(visible_indices(&bubbles, 10), vec![0]);
        assert!(visible_indices(&[], 0).is_empty());
    }
}
