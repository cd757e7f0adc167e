mod common;

use bootfs::{
    cache::{CacheConfig, SectorCache},
    fs::{
        FileSystem, FileType, Path, PosixError,
        fat::{FatFs, FatType, file::ChainState},
    },
};
use common::{ImageBuilder, MockDevice, named_record, pattern, short_record};

type Fs = FatFs<SectorCache<MockDevice>>;

struct Fixture {
    device: MockDevice,
    kernel: Vec<u8>,
    config: Vec<u8>,
    overlay: Vec<u8>,
    clipped: Vec<u8>,
}

/// /
/// ├── KERNEL.IMG                3 contiguous clusters
/// ├── configuration.txt         long name, 100 bytes
/// ├── EMPTY.TXT                 no cluster
/// ├── CLIPPED.BIN               2 clusters, record says 5000 bytes
/// ├── CUT.BIN                   1 cluster, record says 10000 bytes
/// └── BOOT
///     └── overlay-firmware.dtbo fragmented chain
fn fixture() -> Fixture {
    let mut image = ImageBuilder::fat32();
    let cluster = image.cluster_bytes();

    let kernel = pattern(3 * cluster - 100, 1);
    let kernel_cluster = image.file(&kernel);

    let config = pattern(100, 7);
    let config_cluster = image.file(&config);

    let clipped = pattern(2 * cluster, 3);
    let clipped_cluster = image.file(&clipped);

    let cut = pattern(cluster, 4);
    let cut_cluster = image.file(&cut);

    let boot = image.alloc_chain(1)[0];
    let fragments = image.alloc_chain(3);
    let overlay_chain = [fragments[0], fragments[2], fragments[1]];
    image.link(&overlay_chain);
    let overlay = pattern(2 * cluster + 10, 9);
    image.write_chain(&overlay_chain, &overlay);

    let mut boot_records = vec![
        short_record(b".          ", 0x10, boot, 0),
        short_record(b"..         ", 0x10, 0, 0),
    ];
    boot_records.extend(named_record(
        "overlay-firmware.dtbo",
        b"OVERLA~1DTB",
        0x20,
        overlay_chain[0],
        overlay.len() as u32,
    ));
    let bytes: Vec<u8> = boot_records.iter().flatten().copied().collect();
    image.write_chain(&[boot], &bytes);

    let mut root = vec![
        short_record(b"BOOT       ", 0x08, 0, 0),
        short_record(b"KERNEL  IMG", 0x20, kernel_cluster, kernel.len() as u32),
    ];
    root.extend(named_record(
        "configuration.txt",
        b"CONFIG~1TXT",
        0x20,
        config_cluster,
        100,
    ));
    root.push(short_record(b"EMPTY   TXT", 0x20, 0, 0));
    root.push(short_record(b"CLIPPED BIN", 0x20, clipped_cluster, 5000));
    root.push(short_record(b"CUT     BIN", 0x20, cut_cluster, 10_000));
    root.push(short_record(b"BOOT       ", 0x10, boot, 0));
    image.root(&root);

    Fixture {
        device: image.build(),
        kernel,
        config,
        overlay,
        clipped,
    }
}

fn mount(device: MockDevice) -> Fs {
    FatFs::mount(device, CacheConfig::default()).unwrap()
}

fn read_all(fs: &mut Fs, path: &str) -> Vec<u8> {
    let mut reader = fs.open(Path::new(path)).unwrap();
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    out
}

#[test]
fn test_mount_geometry() {
    let fs = mount(fixture().device);
    let partition = fs.partition();
    assert_eq!(partition.fat_type(), FatType::Fat32);
    assert_eq!(partition.volume_label(), "BOOT");
    assert_eq!(partition.sectors_per_cluster(), 8);
    assert_eq!(partition.fat_count(), 2);
    assert_eq!(partition.root_cluster().value(), 2);
    assert_eq!(partition.fat_start().value(), 32);
    assert_eq!(partition.data_start().value(), 64);
    assert_eq!(partition.unused_sectors(), 0);
}

#[test]
fn test_root_listing() {
    let mut fs = mount(fixture().device);
    let paths = fs.read_dir(Path::new("/")).unwrap();
    let paths: Vec<&str> = paths.iter().map(|p| p.as_str()).collect();
    assert_eq!(
        paths,
        [
            "/KERNEL.IMG",
            "/configuration.txt",
            "/EMPTY.TXT",
            "/CLIPPED.BIN",
            "/CUT.BIN",
            "/BOOT"
        ]
    );

    let entries = fs.open_dir(Path::new("")).unwrap();
    let config = &entries[1];
    assert_eq!(config.name(), "configuration.txt");
    assert_eq!(config.short_name(), "CONFIG~1.TXT");
    assert_eq!(config.size(), 100);
    assert!(entries[5].is_directory());
}

#[test]
fn test_read_whole_files() {
    let fixture = fixture();
    let mut fs = mount(fixture.device);

    assert_eq!(read_all(&mut fs, "/KERNEL.IMG"), fixture.kernel);
    assert_eq!(read_all(&mut fs, "/configuration.txt"), fixture.config);
    assert_eq!(read_all(&mut fs, "config~1.txt"), fixture.config);
    assert_eq!(
        read_all(&mut fs, "/BOOT/Overlay-Firmware.DTBO"),
        fixture.overlay
    );
    assert_eq!(read_all(&mut fs, "//boot///overla~1.dtb"), fixture.overlay);
}

#[test]
fn test_reader_state() {
    let fixture = fixture();
    let mut fs = mount(fixture.device);
    let mut reader = fs.open(Path::new("/KERNEL.IMG")).unwrap();
    assert_eq!(reader.state(), ChainState::Positioned);

    let mut buf = vec![0u8; 10_000];
    let n = reader.read(&mut buf).unwrap();
    assert_eq!(n, 512);
    assert_eq!(&buf[..n], &fixture.kernel[..n]);

    let mut rest = Vec::new();
    reader.read_to_end(&mut rest).unwrap();
    assert_eq!(reader.position(), fixture.kernel.len() as u64);
    assert_eq!(reader.state(), ChainState::EndOfChain);
    assert_eq!(reader.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_read_at_offset() {
    let fixture = fixture();
    let mut fs = mount(fixture.device);

    let mut buf = [0u8; 1000];
    let n = fs.read(Path::new("/KERNEL.IMG"), &mut buf, 4000).unwrap();
    assert_eq!(n, 1000);
    assert_eq!(&buf[..], &fixture.kernel[4000..5000]);

    let tail = fixture.kernel.len() - 300;
    let n = fs.read(Path::new("/KERNEL.IMG"), &mut buf, tail).unwrap();
    assert_eq!(n, 300);
    assert_eq!(&buf[..300], &fixture.kernel[tail..]);

    let n = fs
        .read(Path::new("/KERNEL.IMG"), &mut buf, fixture.kernel.len() + 1)
        .unwrap();
    assert_eq!(n, 0);

    let n = fs
        .read(Path::new("/boot/overlay-firmware.dtbo"), &mut buf, 8190)
        .unwrap();
    assert_eq!(n, fixture.overlay.len() - 8190);
    assert_eq!(&buf[..n], &fixture.overlay[8190..]);
}

#[test]
fn test_declared_size_is_enforced() {
    let fixture = fixture();
    let mut fs = mount(fixture.device);

    // The chain is longer than the record says.
    assert_eq!(read_all(&mut fs, "/CLIPPED.BIN"), fixture.clipped[..5000]);

    // The record is longer than the chain.
    let cut = read_all(&mut fs, "/CUT.BIN");
    assert_eq!(cut.len(), 4096);
}

#[test]
fn test_empty_file() {
    let mut fs = mount(fixture().device);
    let reader = fs.open(Path::new("/EMPTY.TXT")).unwrap();
    assert_eq!(reader.state(), ChainState::EndOfChain);
    assert!(read_all(&mut fs, "/EMPTY.TXT").is_empty());

    let mut buf = [0u8; 16];
    assert_eq!(fs.read(Path::new("/EMPTY.TXT"), &mut buf, 0), Ok(0));
    assert_eq!(fs.metadata(Path::new("/EMPTY.TXT")).unwrap().size(), 0);
}

#[test]
fn test_metadata_and_inodes() {
    let mut fs = mount(fixture().device);

    let root = fs.metadata(Path::new("/")).unwrap();
    assert_eq!(root.file_type(), FileType::Directory);
    assert_eq!(root.inode(), 1);

    let kernel = fs.metadata(Path::new("/KERNEL.IMG")).unwrap();
    assert_eq!(kernel.file_type(), FileType::File);
    assert_eq!(kernel.size(), 3 * 4096 - 100);

    let overlay = fs.metadata(Path::new("/BOOT/overlay-firmware.dtbo")).unwrap();
    assert_eq!(overlay.size(), 2 * 4096 + 10);

    // Stable across lookups, unique across paths.
    assert_eq!(fs.metadata(Path::new("/KERNEL.IMG")).unwrap().inode(), kernel.inode());
    assert_ne!(kernel.inode(), overlay.inode());
    assert_ne!(kernel.inode(), root.inode());
    assert_eq!(fs.inodes().get("/KERNEL.IMG"), Some(kernel.inode()));
}

#[test]
fn test_lookup_errors() {
    let mut fs = mount(fixture().device);

    assert_eq!(fs.exists(Path::new("/KERNEL.IMG")), Ok(true));
    assert_eq!(fs.exists(Path::new("/nope")), Ok(false));
    assert_eq!(fs.exists(Path::new("/KERNEL.IMG/x")), Ok(false));

    assert_eq!(fs.metadata(Path::new("/nope")), Err(PosixError::NoEnt));
    assert_eq!(fs.metadata(Path::new("/BOOT/nope")), Err(PosixError::NoEnt));
    assert_eq!(
        fs.metadata(Path::new("/KERNEL.IMG/x")),
        Err(PosixError::NotDir)
    );
    assert!(matches!(
        fs.open_dir(Path::new("/KERNEL.IMG")),
        Err(PosixError::NotDir)
    ));
    assert!(matches!(
        fs.open(Path::new("/missing.bin")),
        Err(PosixError::NoEnt)
    ));
    assert_eq!(fs.read_dir(Path::new("/nope")), Err(PosixError::NoEnt));
}

#[test]
fn test_dot_dot_resolves_to_root() {
    let mut fs = mount(fixture().device);

    let parent = fs.resolve(Path::new("/BOOT/..")).unwrap();
    assert!(parent.is_root());
    assert_eq!(parent.inode(), 1);
    assert_eq!(
        fs.read_dir(Path::new("/boot/..")).unwrap(),
        fs.read_dir(Path::new("/")).unwrap()
    );

    let this = fs.resolve(Path::new("/BOOT/.")).unwrap();
    assert!(this.is_directory());
    assert_eq!(fs.read_dir(Path::new("/BOOT/.")).unwrap().len(), 1);
}

#[test]
fn test_subdirectory_listing() {
    let mut fs = mount(fixture().device);
    let entries = fs.open_dir(Path::new("/BOOT")).unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
    assert_eq!(names, [".", "..", "overlay-firmware.dtbo"]);
    assert_eq!(entries[2].path().as_str(), "/BOOT/overlay-firmware.dtbo");

    let paths = fs.read_dir(Path::new("/BOOT")).unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].as_str(), "/BOOT/overlay-firmware.dtbo");
}

#[test]
fn test_directory_opened_as_stream() {
    let mut fs = mount(fixture().device);
    // A directory has no size: the whole cluster is returned.
    assert_eq!(read_all(&mut fs, "/BOOT").len(), 4096);
    assert_eq!(read_all(&mut fs, "/").len(), 4096);
}

#[test]
fn test_root_chain_ends_on_all_ones() {
    let mut image = ImageBuilder::fat32();
    image.set_fat(2, 0xFFFF_FFFF);
    let data = pattern(100, 5);
    let cluster = image.file(&data);
    image.root(&[short_record(b"A       BIN", 0x20, cluster, 100)]);

    let mut fs = mount(image.build());
    let entries = fs.open_dir(Path::new("/")).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(read_all(&mut fs, "/a.bin"), data);
    // 0xFFFFFFFF ends the root chain after its first cluster.
    assert_eq!(read_all(&mut fs, "/").len(), 4096);
}

#[test]
fn test_cache_stats() {
    let fixture = fixture();
    let mut fs = mount(fixture.device);
    read_all(&mut fs, "/KERNEL.IMG");
    let first = fs.dump_stats(true);
    assert!(first.misses() > 0);

    read_all(&mut fs, "/KERNEL.IMG");
    let second = fs.dump_stats(false);
    // Everything needed is still resident in a 32-slot cache.
    assert_eq!(second.misses(), 0);
    assert!(second.hits() > 0);
    assert_eq!(second.ousters(), 0);
    assert!(fs.cache().resident() <= fs.cache().capacity());
}
