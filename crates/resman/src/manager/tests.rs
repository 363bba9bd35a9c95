use super::*;
use crate::{fs::MemFs, sources::SourceKind, volume::VolumeError};

const VIEW: u16 = 0;
const SCRIPT: u16 = 2;
const VOCAB: u16 = 6;
const FONT: u16 = 7;

/// Huffman-packed: 32 `A`s (code `0`) then the escaped terminator.
const PACKED_AS: [u8; 14] = [
    0x03, 0x00, 0x00, 0x12, 0x41, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00,
];

/// A node table whose only node points past its end.
const CORRUPT_HUFFMAN: [u8; 5] = [0x01, 0x00, 0x00, 0x11, 0x00];

/// Builds a single-volume archive with an early flat index and stored
/// entries.
#[derive(Default)]
struct Sci0Archive {
    map: Vec<u8>,
    volume: Vec<u8>,
}

impl Sci0Archive {
    fn with(self, type_code: u16, number: u16, data: &[u8]) -> Self {
        let len = u16::try_from(data.len()).unwrap();
        self.with_raw(type_code, number, [len + 4, len, 0], data)
    }

    fn with_packed(
        self,
        type_code: u16,
        number: u16,
        method: u16,
        packed: &[u8],
        unpacked_len: u16,
    ) -> Self {
        let len = u16::try_from(packed.len()).unwrap();
        self.with_raw(type_code, number, [len + 4, unpacked_len, method], packed)
    }

    /// Appends an entry whose packed size, unpacked size and method fields
    /// are written as given.
    fn with_raw(mut self, type_code: u16, number: u16, fields: [u16; 3], data: &[u8]) -> Self {
        let word = (type_code << 11) | number;
        let offset = u32::try_from(self.volume.len()).unwrap();
        self.map.extend_from_slice(&word.to_le_bytes());
        self.map.extend_from_slice(&offset.to_le_bytes());

        self.volume.extend_from_slice(&word.to_le_bytes());
        for field in fields {
            self.volume.extend_from_slice(&field.to_le_bytes());
        }
        self.volume.extend_from_slice(data);
        self
    }

    fn into_fs(mut self) -> MemFs {
        self.map.extend_from_slice(&[0xFF; 6]);
        MemFs::new()
            .with_file("RESOURCE.MAP", self.map)
            .with_file("RESOURCE.000", self.volume)
    }
}

fn script(number: u16) -> ResourceId {
    ResourceId::new(ResourceType::Script, number)
}

fn open(fs: MemFs) -> ResourceManager {
    ResourceManager::open(fs, ResourceManagerConfig::default()).unwrap()
}

#[test]
fn catalogs_and_reads_a_flat_archive() {
    let fs = Sci0Archive::default()
        .with(SCRIPT, 0, b"script zero")
        .with(SCRIPT, 3, b"three")
        .with(VIEW, 10, b"\x00\x80view")
        .into_fs();
    let mut manager = open(fs);

    let version = manager.detected_version();
    assert_eq!(version.map(), ResourceVersion::Sci0Sci1Early);
    assert_eq!(version.volume(), ResourceVersion::Sci0Sci1Early);
    assert_eq!(version.era(), CompressionEra::Late);

    assert_eq!(
        manager.list_resources(ResourceType::Script, None),
        BTreeSet::from([script(0), script(3)])
    );
    assert_eq!(
        manager.list_resources(ResourceType::Script, Some(3)),
        BTreeSet::from([script(3)])
    );
    assert!(manager.lookup(script(1)).is_none());

    let data = manager.resolve(script(0), false).unwrap().unwrap();
    assert_eq!(&data[..], b"script zero");
    let entry = manager.lookup(script(0)).unwrap();
    assert_eq!(entry.state(), ResidencyState::Enqueued);
    assert_eq!(entry.location().size(), 11);

    let again = manager.resolve(script(0), false).unwrap().unwrap();
    assert_eq!(again, data);
    assert_eq!(manager.lookup(script(0)).unwrap().lockers(), 0);

    assert_eq!(manager.resolve(script(1), false).unwrap(), None);
}

#[test]
fn locks_balance_with_releases() {
    let fs = Sci0Archive::default().with(SCRIPT, 0, b"abc").into_fs();
    let mut manager = open(fs);

    manager.resolve(script(0), true).unwrap();
    manager.resolve(script(0), true).unwrap();
    assert_eq!(manager.lookup(script(0)).unwrap().lockers(), 2);
    assert_eq!(manager.catalog().locked_bytes(), 3);

    assert!(manager.release(script(0)));
    assert_eq!(manager.lookup(script(0)).unwrap().state(), ResidencyState::Locked);
    assert!(manager.release(script(0)));
    assert_eq!(manager.lookup(script(0)).unwrap().state(), ResidencyState::Enqueued);
    assert!(!manager.release(script(0)));
    assert_eq!(manager.catalog().locked_bytes(), 0);
}

#[test]
fn evicted_resources_load_again() {
    let fs = Sci0Archive::default()
        .with(SCRIPT, 0, b"12345678")
        .with(SCRIPT, 1, b"abcdefgh")
        .into_fs();
    let config = ResourceManagerConfig::default().with_cache_ceiling_bytes(10);
    let mut manager = ResourceManager::open(fs, config).unwrap();

    manager.resolve(script(0), false).unwrap();
    manager.resolve(script(1), false).unwrap();
    assert_eq!(manager.lookup(script(0)).unwrap().state(), ResidencyState::Unloaded);
    assert_eq!(manager.lookup(script(1)).unwrap().state(), ResidencyState::Enqueued);
    assert!(manager.catalog().enqueued_bytes() <= 10);

    let data = manager.resolve(script(0), false).unwrap().unwrap();
    assert_eq!(&data[..], b"12345678");
    assert_eq!(manager.lookup(script(1)).unwrap().state(), ResidencyState::Unloaded);
}

#[test]
fn patches_override_volume_entries() {
    let fs = Sci0Archive::default()
        .with(SCRIPT, 0, b"original")
        .into_fs()
        .with_file("script.000", b"\x82\x00patched".to_vec())
        .with_file("script.001", b"\x80\x00wrong type".to_vec());
    let mut manager = open(fs);

    let entry = manager.lookup(script(0)).unwrap();
    let source = manager.sources().get(entry.location().source());
    assert!(matches!(source.kind(), SourceKind::Patch));
    assert_eq!(source.location(), "script.000");

    let data = manager.resolve(script(0), false).unwrap().unwrap();
    assert_eq!(&data[..], b"patched");
    assert!(manager.lookup(script(1)).is_none());
}

#[test]
fn early_vocabulary_selects_early_compression() {
    let fs = Sci0Archive::default()
        .with(SCRIPT, 0, b"s")
        .with(VOCAB, 0, b"v")
        .into_fs();
    let manager = open(fs);
    assert_eq!(manager.detected_version().era(), CompressionEra::Early);

    let fs = Sci0Archive::default()
        .with(SCRIPT, 0, b"s")
        .with(VOCAB, 0, b"v")
        .into_fs();
    let config = ResourceManagerConfig::default().with_compression_era(CompressionEra::Late);
    let manager = ResourceManager::open(fs, config).unwrap();
    assert_eq!(manager.detected_version().era(), CompressionEra::Late);
}

#[test]
fn loose_wave_files_become_audio() {
    let wave = b"RIFF\x04\x00\x00\x00WAVE".to_vec();
    let fs = Sci0Archive::default()
        .with(SCRIPT, 0, b"s")
        .into_fs()
        .with_file("12.wav", wave.clone())
        .with_file("intro.wav", b"RIFF".to_vec());
    let mut manager = open(fs);

    let audio = ResourceId::new(ResourceType::Audio, 12);
    let data = manager.resolve(audio, false).unwrap().unwrap();
    assert_eq!(&data[..], &wave[..]);
    assert_eq!(manager.list_resources(ResourceType::Audio, None).len(), 1);
}

#[test]
fn external_audio_maps_locate_their_volumes() {
    let mut audio_map = Vec::new();
    audio_map.extend_from_slice(&5u16.to_le_bytes());
    audio_map.extend_from_slice(&(1u32 << 28).to_le_bytes());
    audio_map.extend_from_slice(&4u32.to_le_bytes());
    audio_map.extend_from_slice(&0xFFFFu16.to_le_bytes());

    let fs = Sci0Archive::default()
        .with(SCRIPT, 0, b"s")
        .into_fs()
        .with_file("AUDIO001.MAP", audio_map)
        .with_file("AUDIO001.001", b"wave".to_vec());
    let mut manager = open(fs);

    let audio = ResourceId::new(ResourceType::Audio, 5);
    let entry = manager.lookup(audio).unwrap();
    let source = manager.sources().get(entry.location().source());
    assert!(matches!(source.kind(), SourceKind::AudioVolume { number: 1, .. }));
    let data = manager.resolve(audio, false).unwrap().unwrap();
    assert_eq!(&data[..], b"wave");
}

#[test]
fn probes_derive_facts_from_known_resources() {
    let fs = Sci0Archive::default()
        .with(VIEW, 0, b"\x00\x00ega view")
        .with(VIEW, 1, b"\x00\x80vga view")
        .with(FONT, 0, b"\x00\x00\x00\x01")
        .into_fs()
        .with_file("view.000", b"\x80\x00\x00\x00".to_vec());
    let mut manager = open(fs);

    assert!(!manager.is_platform_variant());
    assert_eq!(manager.view_color_depth(), ViewColorDepth::Vga);
    assert!(manager.has_extended_font());
}

#[test]
fn probes_without_resources_report_nothing() {
    let fs = Sci0Archive::default().with(SCRIPT, 0, b"s").into_fs();
    let mut manager = open(fs);
    assert_eq!(manager.view_color_depth(), ViewColorDepth::Unknown);
    assert!(!manager.has_extended_font());
}

#[test]
fn missing_or_unreadable_archives_are_rejected() {
    let result = ResourceManager::open(MemFs::new(), ResourceManagerConfig::default());
    assert!(matches!(result, Err(ArchiveError::SourceNotFound { .. })));

    let fs = MemFs::new().with_file("resource.map", vec![1, 2, 3]);
    let result = ResourceManager::open(fs, ResourceManagerConfig::default());
    assert!(matches!(result, Err(ArchiveError::UnknownFormat)));
}

#[test]
fn entries_outside_their_volume_are_dropped() {
    let mut archive = Sci0Archive::default().with(SCRIPT, 0, b"s");
    let word = (SCRIPT << 11) | 1;
    archive.map.extend_from_slice(&word.to_le_bytes());
    archive.map.extend_from_slice(&0x0000_1000u32.to_le_bytes());
    let manager = open(archive.into_fs());

    assert!(manager.lookup(script(0)).is_some());
    assert!(manager.lookup(script(1)).is_none());
}

#[test]
fn decompression_failures_stay_with_their_resource() {
    let fs = Sci0Archive::default()
        .with_packed(SCRIPT, 0, 1, &PACKED_AS, 32)
        .with_packed(SCRIPT, 1, 1, &CORRUPT_HUFFMAN, 8)
        .into_fs();
    let mut manager = open(fs);
    assert_eq!(manager.detected_version().era(), CompressionEra::Late);

    for _ in 0..2 {
        let err = manager.resolve(script(1), false).unwrap_err();
        assert!(matches!(err, ArchiveError::Decompression { id, .. } if id == script(1)));
        assert_eq!(manager.lookup(script(1)).unwrap().state(), ResidencyState::Unloaded);
    }

    let data = manager.resolve(script(0), false).unwrap().unwrap();
    assert_eq!(&data[..], [b'A'; 32]);
    assert_eq!(manager.lookup(script(0)).unwrap().state(), ResidencyState::Enqueued);
}

#[test]
fn entry_sizes_past_the_volume_end_are_rejected() {
    let fs = Sci0Archive::default()
        .with(SCRIPT, 0, b"fine")
        .with_raw(SCRIPT, 1, [0xFFFF, 0xFFFF, 1], &CORRUPT_HUFFMAN)
        .into_fs();
    let mut manager = open(fs);

    let err = manager.resolve(script(1), false).unwrap_err();
    assert!(matches!(
        err,
        ArchiveError::InvalidEntry {
            source: VolumeError::PastEnd { .. },
            ..
        }
    ));
    assert_eq!(manager.lookup(script(1)).unwrap().state(), ResidencyState::Unloaded);
    assert_eq!(&manager.resolve(script(0), false).unwrap().unwrap()[..], b"fine");
}
