use super::*;

const LARGE_SEQ: u64 = 0x100000000000;

fn run(window_size: usize, max_seq: u64, input: &[u64], valid: &[bool]) -> Vec<u64> {
    let mut det = SlidingWindowDetector::new(window_size, max_seq);
    let mut accepted = vec![];
    for (i, seq) in input.iter().enumerate() {
        if det.check(*seq) && valid[i] {
            det.accept();
            accepted.push(*seq);
        }
    }
    accepted
}

#[test]
fn test_replay_detector_continuous() {
    let input: Vec<u64> = (0..20).collect();
    let valid = vec![true; input.len()];
    assert_eq!(run(5, 0x0000ffffffffffff, &input, &valid), input);
}

#[test]
fn test_replay_detector_duplicates_and_late() {
    let input = [0, 1, 2, 3, 1, 4, 10, 11, 4, 5, 9, 12];
    let valid = vec![true; input.len()];
    assert_eq!(
        run(5, 0x0000ffffffffffff, &input, &valid),
        vec![0, 1, 2, 3, 4, 10, 11, 9, 12],
        "duplicates and packets older than the window are dropped"
    );
}

#[test]
fn test_replay_detector_unaccepted_can_repeat() {
    let input = [0, 1, 2, 2, 3];
    let valid = [true, true, false, true, true];
    assert_eq!(
        run(5, 0x0000ffffffffffff, &input, &valid),
        vec![0, 1, 2, 3]
    );
}

#[test]
fn test_replay_detector_large_seq_and_limit() {
    let input = [LARGE_SEQ, LARGE_SEQ + 1, LARGE_SEQ - 1, 0x1000000000000];
    let valid = vec![true; input.len()];
    assert_eq!(
        run(64, 0x0000ffffffffffff, &input, &valid),
        vec![LARGE_SEQ, LARGE_SEQ + 1, LARGE_SEQ - 1]
    );
}

#[test]
fn test_fixed_big_int_shift() {
    let mut bi = FixedBigInt::new(68);
    bi.set_bit(0);
    bi.lsh(64);
    assert_eq!(bi.bit(64), 1);
    assert_eq!(bi.bit(0), 0);
    bi.lsh(4);
    assert_eq!(bi.bit(68), 0, "bits past the length are dropped");
    assert_eq!(bi.to_string(), "00000000000000000000000000000000");
}
