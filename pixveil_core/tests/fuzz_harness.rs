use pixveil_core::{MemoryStore, PipelineConfig, PixelBuffer, VeilSession};

#[test]
#[ignore]
fn random_buffers_roundtrip() {
    // Random shapes, noise levels and shifts through the OS-seeded session.
    for _ in 0..16u8 {
        let height = 1 + (rand::random::<u8>() % 32) as usize;
        let width = 1 + (rand::random::<u8>() % 32) as usize;
        let data: Vec<u8> = (0..height * width * 3).map(|_| rand::random::<u8>()).collect();
        let buffer = PixelBuffer::new(height, width, data).unwrap();
        let config = PipelineConfig::default()
            .with_noise_level(1 + (rand::random::<u8>() as i64))
            .with_shift_amount(rand::random::<i8>() as i64);
        let session = VeilSession::new(config).expect("config");
        let mut store = MemoryStore::new();
        let (obfuscated, _) = session.encode_into(buffer.clone(), &mut store).expect("encode");
        let (restored, _) = session.decode_from(obfuscated, &store).expect("decode");
        assert_eq!(buffer, restored);
    }
}
