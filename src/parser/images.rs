use std::collections::VecDeque;

use super::{ImageRef, Question};

/// Decides which of a page's images belong to which question or option.
pub trait ImagePolicy {
    /// Attach images to `questions` (in the order they were closed) and
    /// return whatever was not used.
    fn assign(&self, questions: &mut [Question], images: VecDeque<ImageRef>) -> Vec<ImageRef>;
}

/// First-available order, no geometry: an option-less question takes one
/// image, otherwise each option in key order takes the next image.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyOrder;

impl ImagePolicy for GreedyOrder {
    fn assign(&self, questions: &mut [Question], mut images: VecDeque<ImageRef>) -> Vec<ImageRef> {
        for q in questions.iter_mut() {
            if q.options.is_empty() {
                if let Some(img) = images.pop_front() {
                    q.question_images.push(img);
                }
            } else {
                for opt in q.options.iter_mut() {
                    match images.pop_front() {
                        Some(img) => opt.image = Some(img),
                        None => break,
                    }
                }
            }
            q.option_images = q.options.iter().filter_map(|o| o.image.clone()).collect();
        }
        images.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(n: usize) -> VecDeque<ImageRef> {
        (0..n).map(|i| ImageRef::new(format!("img{}.png", i))).collect()
    }

    fn with_options(number: u32, keys: &[char]) -> Question {
        let mut q = Question::new(0, "", number, "q");
        for k in keys {
            q.set_option(*k, "opt");
        }
        q
    }

    #[test]
    fn optionless_question_takes_one_image() {
        let mut qs = vec![Question::new(0, "", 1, "q")];
        let left = GreedyOrder.assign(&mut qs, queue(2));
        assert_eq!(qs[0].question_images, vec![ImageRef::new("img0.png")]);
        assert!(qs[0].option_images.is_empty());
        assert_eq!(left, vec![ImageRef::new("img1.png")]);
    }

    #[test]
    fn two_options_three_images() {
        let mut qs = vec![with_options(1, &['A', 'B'])];
        let left = GreedyOrder.assign(&mut qs, queue(3));
        assert_eq!(
            qs[0].option_images,
            vec![ImageRef::new("img0.png"), ImageRef::new("img1.png")]
        );
        assert_eq!(qs[0].option('A').unwrap().image, Some(ImageRef::new("img0.png")));
        assert_eq!(qs[0].option('B').unwrap().image, Some(ImageRef::new("img1.png")));
        assert!(qs[0].question_images.is_empty());
        assert_eq!(left.len(), 1);
    }

    #[test]
    fn exhaustion_stops_early() {
        let mut qs = vec![with_options(1, &['A', 'B', 'C', 'D'])];
        let left = GreedyOrder.assign(&mut qs, queue(2));
        assert_eq!(qs[0].option_images.len(), 2);
        assert!(qs[0].option('C').unwrap().image.is_none());
        assert!(left.is_empty());
    }

    #[test]
    fn option_images_follow_insertion_order() {
        let mut qs = vec![with_options(1, &['C', 'A'])];
        GreedyOrder.assign(&mut qs, queue(2));
        assert_eq!(qs[0].option('C').unwrap().image, Some(ImageRef::new("img0.png")));
        assert_eq!(qs[0].option_images[1], ImageRef::new("img1.png"));
    }

    #[test]
    fn questions_consume_in_close_order() {
        let mut qs = vec![
            Question::new(0, "", 1, "figure"),
            with_options(2, &['A', 'B']),
            Question::new(0, "", 3, "no image left"),
        ];
        GreedyOrder.assign(&mut qs, queue(3));
        assert_eq!(qs[0].question_images, vec![ImageRef::new("img0.png")]);
        assert_eq!(qs[1].option_images.len(), 2);
        assert!(qs[2].question_images.is_empty());
    }

    #[test]
    fn no_images_leaves_everything_unset() {
        let mut qs = vec![with_options(1, &['A']), Question::new(0, "", 2, "q")];
        let left = GreedyOrder.assign(&mut qs, VecDeque::new());
        assert!(left.is_empty());
        assert!(qs.iter().all(|q| q.question_images.is_empty() && q.option_images.is_empty()));
    }
}
