//! Frame-level defect precedence and CRC behavior.

mod common;

use common::*;

#[test]
fn defect_precedence_grid() {
    // (len=15, SOP ok) -> 97: length wins over SOP
    let mut frame = vec![0u8; 15];
    frame[0] = SOP;
    assert_eq!(defect(&frame), DEFECT_LENGTH);

    // (len=20, SOP=0x00) -> 98
    let mut frame = short_frame(0x8A, 0, &[16]);
    frame[0] = 0x00;
    assert_eq!(defect(&frame), DEFECT_SOP);

    // (len=20, SOP ok, bad CRC) -> 99
    let mut frame = short_frame(0x8A, 0, &[16]);
    frame[MSG_LEN - 1] ^= 0xFF;
    assert_eq!(defect(&frame), DEFECT_CRC);

    // (len=20, SOP ok, good CRC) -> 0
    assert_eq!(defect(&short_frame(0x8A, 0, &[16])), DEFECT_NONE);

    // (len=182, SOP_BIG, good CRC) -> 0
    assert_eq!(defect(&big_frame(0x85, 0, &[16])), DEFECT_NONE);

    // big SOP in a short frame -> 98
    let mut frame = short_frame(0x8A, 0, &[16]);
    frame[0] = SOP_BIG;
    frame[MSG_LEN - 1] = get_crc(&frame, MSG_LEN - 1);
    assert_eq!(defect(&frame), DEFECT_SOP);
}

#[test]
fn crc_covers_everything_but_its_own_slot() {
    let frame = short_frame(0x8A, 5, &[16, 1, 6]);
    // Flipping any covered byte breaks the CRC
    for i in 0..MSG_LEN - 1 {
        let mut bad = frame.clone();
        bad[i] ^= 0x01;
        if i == 0 {
            // SOP flip is caught earlier
            assert_eq!(defect(&bad), DEFECT_SOP);
        } else {
            assert_eq!(defect(&bad), DEFECT_CRC, "byte {i}");
        }
    }
}

#[test]
fn empty_and_oversized_buffers_are_length_defects() {
    assert_eq!(defect(&[]), DEFECT_LENGTH);
    assert_eq!(defect(&vec![0u8; 183]), DEFECT_LENGTH);
    assert_eq!(defect(&vec![0u8; 21]), DEFECT_LENGTH);
}
