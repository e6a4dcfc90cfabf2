use anyhow::{anyhow, Context, Result};
use clap::{App, Arg};
use log::{info, warn};
use lpfs::{
    block_dev::BlockDevice,
    constant::{BlockAddr, Ino, BLOCK_SIZE, ROOT_INO},
    mkfs::ImageBuilder,
    FsError, FsResult, Lpfs, Vnode,
};
use std::{
    fs::{self, File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    os::unix::fs::PermissionsExt,
    path::Path,
    sync::{Arc, Mutex},
    time::UNIX_EPOCH,
};

const DEFAULT_BLOCKS: u64 = 8192;

#[derive(Debug)]
struct DiskImg(Mutex<File>);

impl DiskImg {
    fn create(path: &Path, blocks: u64) -> Result<Arc<Self>> {
        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        f.set_len(blocks * BLOCK_SIZE as u64)?;
        Ok(Arc::new(Self(Mutex::new(f))))
    }

    fn at(&self, block_addr: BlockAddr) -> FsResult<std::sync::MutexGuard<'_, File>> {
        let mut file = self.0.lock().map_err(|_| FsError::Io)?;
        file.seek(SeekFrom::Start(block_addr * BLOCK_SIZE as u64))
            .map_err(|err| {
                warn!("seek to block {block_addr}: {err}");
                FsError::Io
            })?;
        Ok(file)
    }
}

impl BlockDevice for DiskImg {
    fn read_block(&self, block_addr: BlockAddr, buf: &mut [u8]) -> FsResult<()> {
        self.at(block_addr)?
            .read_exact(&mut buf[..BLOCK_SIZE])
            .map_err(|err| {
                warn!("read block {block_addr}: {err}");
                FsError::Io
            })
    }

    fn write_block(&self, block_addr: BlockAddr, buf: &[u8]) -> FsResult<()> {
        self.at(block_addr)?
            .write_all(&buf[..BLOCK_SIZE])
            .map_err(|err| {
                warn!("write block {block_addr}: {err}");
                FsError::Io
            })
    }
}

fn micros(time: std::io::Result<std::time::SystemTime>) -> u64 {
    time.ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |since| since.as_micros() as u64)
}

/// Mirrors the host tree under `src` into `parent`.
fn pack_dir(builder: &mut ImageBuilder, parent: Ino, src: &Path) -> Result<()> {
    let mut entries = fs::read_dir(src)
        .with_context(|| format!("cannot read {}", src.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = entry
            .file_name()
            .into_string()
            .map_err(|name| anyhow!("non utf-8 name {:?}", name))?;
        let meta = entry.metadata()?;
        let perm = meta.permissions().mode() & 0o7777;
        let ino = if meta.is_dir() {
            let ino = builder
                .add_dir(parent, &name, perm)
                .map_err(|err| anyhow!("{name}: {err}"))?;
            pack_dir(builder, ino, &entry.path())?;
            ino
        } else if meta.is_file() {
            let mut data = Vec::new();
            File::open(entry.path())?.read_to_end(&mut data)?;
            builder
                .add_file(parent, &name, &data, perm)
                .map_err(|err| anyhow!("{name}: {err}"))?
        } else {
            warn!("skip {}: not a regular file or directory", entry.path().display());
            continue;
        };
        let mtime = micros(meta.modified());
        builder
            .set_times(ino, mtime, mtime)
            .map_err(|err| anyhow!("{name}: {err}"))?;
        info!("packed {} as ino {ino}", entry.path().display());
    }
    Ok(())
}

fn list(dir: &Vnode, prefix: &str) -> Result<()> {
    for entry in dir.as_dir()?.ls()? {
        let name = entry.name_lossy();
        if name == "." || name == ".." {
            continue;
        }
        let path = format!("{prefix}/{name}");
        let child = dir.as_dir()?.lookup(&name)?;
        println!("{:>6} {:>10} {}", child.ino(), child.attr().size, path);
        if child.is_dir() {
            list(&child, &path)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let matches = App::new("lpfs packer")
        .arg(
            Arg::with_name("source")
                .short("s")
                .long("source")
                .takes_value(true)
                .required(true)
                .help("Host directory to pack"),
        )
        .arg(
            Arg::with_name("target")
                .short("t")
                .long("target")
                .takes_value(true)
                .required(true)
                .help("Path of the image to write"),
        )
        .arg(
            Arg::with_name("blocks")
                .short("b")
                .long("blocks")
                .takes_value(true)
                .help("Minimum image size in blocks"),
        )
        .get_matches();
    let src_path = matches
        .value_of("source")
        .ok_or_else(|| anyhow!("missing --source"))?;
    let target_path = matches
        .value_of("target")
        .ok_or_else(|| anyhow!("missing --target"))?;
    let blocks = matches
        .value_of("blocks")
        .map(str::parse::<u64>)
        .transpose()?
        .unwrap_or(DEFAULT_BLOCKS);
    println!("src_path = {}\ntarget_path = {}", src_path, target_path);

    let mut builder = ImageBuilder::new();
    pack_dir(&mut builder, ROOT_INO, Path::new(src_path))?;

    let total = builder.required_blocks().max(blocks);
    let img = DiskImg::create(Path::new(target_path), total)?;
    let used = builder
        .build(img.as_ref())
        .map_err(|err| anyhow!("cannot build image: {err}"))?;
    println!(
        "{} inodes, {used} of {total} blocks used",
        builder.inode_count()
    );

    let fs = Lpfs::mount(img).map_err(|err| anyhow!("cannot mount image: {err}"))?;
    list(&Vnode::root(&fs)?, "")?;
    fs.flush()?;
    Ok(())
}
