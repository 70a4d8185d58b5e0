#![no_main]

use libfuzzer_sys::fuzz_target;
use simhost_rpc::{Blob, Decode, RawItem};
use simhost_rpc::simhost_math::{Mat, Pose};

fuzz_target!(|data: &[u8]| {
    // Every decoder must return Ok or Err on arbitrary bytes, never panic,
    // and never claim more bytes than it was given.
    if let Ok((_, used)) = i32::decode(data) {
        assert!(used <= data.len());
    }
    if let Ok((_, used)) = String::decode(data) {
        assert!(used <= data.len());
    }
    if let Ok((_, used)) = Vec::<f64>::decode(data) {
        assert!(used <= data.len());
    }
    if let Ok((m, used)) = Mat::decode(data) {
        assert!(used <= data.len());
        assert_eq!(used, 8 + m.rows() * m.cols() * 8);
    }
    let _ = Pose::decode(data);
    let _ = RawItem::decode(data);
    let _ = Blob::decode(data);
});
