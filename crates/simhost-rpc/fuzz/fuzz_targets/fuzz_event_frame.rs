#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use simhost::events::EventCodec;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Decode a stream of event frames; errors are fine, panics are not.
    let mut codec = EventCodec::default();
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_event)) = codec.decode(&mut buf) {}
    let _ = codec.decode_eof(&mut buf);
});
