use std::io::Cursor;

use dotmatrixvideo::{
    run_extract_pipeline, run_inject_pipeline, FrameGeometry, PipelineError, PipelineSettings,
    HEADER_SIZE,
};

fn get_unit_test_settings(threads: usize) -> PipelineSettings {
    // 16 x 4 dots, 24 bytes per frame
    PipelineSettings {
        geometry: FrameGeometry::new(64, 16, 4).unwrap(),
        threads,
        show_progress: false,
    }
}

fn get_unit_test_data(number_of_byte: usize) -> Vec<u8> {
    let mut result = Vec::with_capacity(number_of_byte);
    for i in 0..number_of_byte {
        result.push(((i * 31 + 7) % 251) as u8);
    }
    result
}

/// Stand-in for a lossless codec: RGBA frames in, RGB24 frames out
fn codec_roundtrip(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks(4).flat_map(|p| p[..3].to_vec()).collect()
}

fn inject(data: &[u8], settings: &PipelineSettings) -> Vec<u8> {
    let mut video = Vec::new();
    run_inject_pipeline(data, data.len() as u64, &mut video, settings).unwrap();
    video
}

fn extract(rgb: &[u8], settings: &PipelineSettings) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    run_extract_pipeline(rgb, &mut out, settings).unwrap();
    out.into_inner()
}

fn roundtrip(data: &[u8], threads: usize) -> Vec<u8> {
    let settings = get_unit_test_settings(threads);
    let video = inject(data, &settings);
    extract(&codec_roundtrip(&video), &settings)
}

#[test]
fn test_roundtrip_single_byte() {
    for threads in [1, 2, 5] {
        assert_eq!(roundtrip(&[0x41], threads), vec![0x41]);
    }
}

#[test]
fn test_single_byte_is_one_frame() {
    let settings = get_unit_test_settings(3);
    let video = inject(&[0x41], &settings);
    assert_eq!(video.len(), settings.geometry.inject_frame_len());
}

#[test]
fn test_roundtrip_empty_file() {
    for threads in [1, 4] {
        assert_eq!(roundtrip(&[], threads), Vec::<u8>::new());
    }
}

#[test]
fn test_roundtrip_frame_boundaries() {
    let capacity = 24;
    let lengths = [
        capacity - HEADER_SIZE - 1,
        capacity - HEADER_SIZE,
        capacity - HEADER_SIZE + 1,
        2 * capacity - HEADER_SIZE - 1,
        2 * capacity - HEADER_SIZE,
        2 * capacity - HEADER_SIZE + 1,
        10 * capacity - HEADER_SIZE,
    ];
    for len in lengths {
        let data = get_unit_test_data(len);
        for threads in [1, 3, 8] {
            let result = roundtrip(&data, threads);
            assert_eq!(result.len(), len, "len {} threads {}", len, threads);
            assert_eq!(result, data, "len {} threads {}", len, threads);
        }
    }
}

#[test]
fn test_exact_multiple_produces_k_frames() {
    let settings = get_unit_test_settings(2);
    let k = 6;
    let data = get_unit_test_data(k * 24 - HEADER_SIZE);
    let mut video = Vec::new();
    let report = run_inject_pipeline(&data[..], data.len() as u64, &mut video, &settings).unwrap();
    assert_eq!(report.frames, k as u64);
    assert_eq!(video.len(), k * settings.geometry.inject_frame_len());
}

#[test]
fn test_roundtrip_many_frames_many_threads() {
    let data = get_unit_test_data(5000);
    assert_eq!(roundtrip(&data, 16), data);
}

#[test]
fn test_inject_output_independent_of_thread_count() {
    let data = get_unit_test_data(1000);
    let single = inject(&data, &get_unit_test_settings(1));
    let many = inject(&data, &get_unit_test_settings(7));
    assert_eq!(single, many);
}

#[test]
fn test_roundtrip_default_geometry() {
    let settings = PipelineSettings {
        geometry: FrameGeometry::default(),
        threads: 3,
        show_progress: false,
    };
    // Two full frames plus a short third one
    let data = get_unit_test_data(2 * 12150 + 100);
    let video = inject(&data, &settings);
    assert_eq!(video.len(), 3 * settings.geometry.inject_frame_len());
    assert_eq!(extract(&codec_roundtrip(&video), &settings), data);
}

#[test]
fn test_extract_tolerates_codec_noise() {
    let settings = get_unit_test_settings(4);
    let data = get_unit_test_data(300);
    let noisy: Vec<u8> = codec_roundtrip(&inject(&data, &settings))
        .into_iter()
        .map(|v| if v >= 0x80 { 0xE0 } else { 0x10 })
        .collect();
    assert_eq!(extract(&noisy, &settings), data);
}

#[test]
fn test_extract_ignores_trailing_padding_frames() {
    let settings = get_unit_test_settings(3);
    let data = get_unit_test_data(40);
    let mut rgb = codec_roundtrip(&inject(&data, &settings));
    // Codec repeating the last frame a few times
    let frame_len = settings.geometry.extract_frame_len();
    let last = rgb[rgb.len() - frame_len..].to_vec();
    for _ in 0..3 {
        rgb.extend_from_slice(&last);
    }
    assert_eq!(extract(&rgb, &settings), data);
}

#[test]
fn test_extract_reports_dropped_frames() {
    let settings = get_unit_test_settings(3);
    let data = get_unit_test_data(200);
    let rgb = codec_roundtrip(&inject(&data, &settings));
    let frame_len = settings.geometry.extract_frame_len();
    // Lose the last frame
    let truncated = &rgb[..rgb.len() - frame_len];

    let mut out = Cursor::new(Vec::new());
    let result = run_extract_pipeline(truncated, &mut out, &settings);
    assert!(matches!(result, Err(PipelineError::MissingFrames { .. })));
}

#[test]
fn test_inject_reports_short_source() {
    let settings = get_unit_test_settings(2);
    let data = get_unit_test_data(50);
    let mut video = Vec::new();
    let result = run_inject_pipeline(&data[..], 500, &mut video, &settings);
    assert!(matches!(result, Err(PipelineError::Io(_))));
}
