use std::process::exit;
use std::sync::Arc;

use crate::fd::{self, Fd};
use crate::{device::DiskFileImg, error::Result};
use anyhow::{anyhow, Ok};
use lpfs::{block_dev::BlockDevice, DirCursor, InodeAttr, InodeKind, Lpfs, Vnode};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

pub struct Repl {
    rl: DefaultEditor,
    fs: Arc<Lpfs>,
    fd_table: fd::Table,
    root: Vnode,
    cwd: Vnode,
    path: Vec<String>,
    promot: String,
}

impl Repl {
    pub fn new(image: Option<String>) -> Result<Self> {
        println!("welcome to the lpfs repl!");
        let mut rl = DefaultEditor::new()?;
        let device = match image {
            Some(path) => Self::open_device(&path)?,
            None => Self::load_device(&mut rl)?,
        };
        let fs = Self::load_fs(device)?;
        let root = Vnode::root(&fs)?;
        let cwd = root.clone();
        Ok(Self {
            rl,
            fs,
            fd_table: fd::Table::new(),
            root,
            cwd,
            path: vec![],
            promot: "/ > ".to_owned(),
        })
    }

    fn open_device(path: &str) -> Result<Arc<dyn BlockDevice>> {
        println!("loading disk image from {}...", path.trim());
        Ok(Arc::new(DiskFileImg::open(path.trim())?))
    }

    fn load_device(rl: &mut DefaultEditor) -> Result<Arc<dyn BlockDevice>> {
        match rl.readline("input the path where the disk image is located> ") {
            rustyline::Result::Ok(path) => Self::open_device(&path),
            Err(err) => Err(anyhow!("readline error: {}", err)),
        }
    }

    fn load_fs(device: Arc<dyn BlockDevice>) -> Result<Arc<Lpfs>> {
        println!("loading file system from device...");
        let fs = Lpfs::mount(device).map_err(|err| anyhow!("cannot mount image: {err}"))?;
        println!("file system loaded! {} inodes", fs.imap().len());
        Ok(fs)
    }

    pub fn run(&mut self) {
        loop {
            match self.rl.readline(&self.promot) {
                rustyline::Result::Ok(line) => {
                    let _ = self.rl.add_history_entry(line.as_str());
                    if let Err(err) = self.exec(&line) {
                        println!("error: {}", err);
                    }
                }
                Err(ReadlineError::Io(err)) => {
                    println!("readline error: {}", err);
                    exit(1);
                }
                Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                    self.exit();
                }
                Err(err) => {
                    println!("readline error: {}", err);
                    exit(1);
                }
            }
        }
    }

    pub fn fs(&self) -> Arc<Lpfs> {
        self.fs.clone()
    }

    pub fn root(&self) -> Vnode {
        self.root.clone()
    }

    pub fn cwd(&self) -> Vnode {
        self.cwd.clone()
    }

    fn exec(&mut self, line: &str) -> Result<()> {
        fn matched<'a>(line: &'a str, prefix: &'a str) -> Option<&'a str> {
            match line.strip_prefix(prefix) {
                Some(rest) if rest.is_empty() || rest.starts_with(' ') => Some(rest.trim()),
                _ => None,
            }
        }

        fn matched_noarg(line: &str, command: &str) -> Result<bool> {
            match matched(line, command) {
                Some("") => Ok(true),
                Some(_) => Err(anyhow!("too many arguments")),
                None => Ok(false),
            }
        }

        let line = line.trim();
        if line.is_empty() {
            Ok(())
        } else if let Some(leftover) = matched(line, "cd") {
            let path = Self::one_arg(leftover, "path")?;
            self.cd(path)
        } else if matched_noarg(line, "pwd")? {
            self.pwd()
        } else if let Some(leftover) = matched(line, "ls") {
            self.ls(leftover == "-l")
        } else if let Some(leftover) = matched(line, "stat") {
            let name = Self::one_arg(leftover, "name")?;
            self.stat(name)
        } else if let Some(leftover) = matched(line, "cat") {
            let name = Self::one_arg(leftover, "name")?;
            self.cat(name)
        } else if let Some(leftover) = matched(line, "bmap") {
            let (name, block) = self.parse_bmap(leftover)?;
            self.bmap(name, block)
        } else if let Some(leftover) = matched(line, "imap") {
            let ino = Self::one_arg(leftover, "ino")?.parse()?;
            self.imap(ino)
        } else if let Some(leftover) = matched(line, "open") {
            let name = Self::one_arg(leftover, "name")?;
            self.open(name)
        } else if let Some(leftover) = matched(line, "close") {
            let fd = Self::one_arg(leftover, "fd")?.parse()?;
            self.close(fd)
        } else if let Some(leftover) = matched(line, "read") {
            let (fd, size) = self.parse_read(leftover)?;
            self.read(fd, size)
        } else if let Some(leftover) = matched(line, "seek") {
            let (fd, step) = self.parse_seek(leftover)?;
            self.seek(fd, step)
        } else if matched_noarg(line, "stats")? {
            self.stats()
        } else if matched_noarg(line, "exit")? {
            self.exit()
        } else {
            Err(anyhow!("unknown command"))?
        }
    }

    fn one_arg<'a>(leftover: &'a str, what: &str) -> Result<&'a str> {
        let mut split = leftover.split_whitespace();
        let arg = split.next().ok_or_else(|| anyhow!("missing {what}"))?;
        if split.next().is_some() {
            Err(anyhow!("too many arguments"))
        } else {
            Ok(arg)
        }
    }

    fn walk(&self, path: &str) -> Result<Vnode> {
        let mut node = if path.starts_with('/') {
            self.root()
        } else {
            self.cwd()
        };
        for name in path.split('/').filter(|name| !name.is_empty()) {
            node = node
                .as_dir()
                .map_err(|_| anyhow!("`{name}`: not a directory"))?
                .lookup(name)
                .map_err(|err| anyhow!("`{name}`: {err}"))?;
        }
        Ok(node)
    }

    fn cd(&mut self, path: &str) -> Result<()> {
        let target = self.walk(path)?;
        if !target.is_dir() {
            Err(anyhow!("`{path}` is not a directory"))?;
        }
        if path.starts_with('/') {
            self.path.clear();
        }
        for name in path.split('/').filter(|name| !name.is_empty()) {
            match name {
                "." => {}
                ".." => {
                    self.path.pop();
                }
                name => self.path.push(name.to_owned()),
            }
        }
        self.cwd = target;
        self.promot = format!("/{} > ", self.path.join("/"));
        Ok(())
    }

    fn pwd(&self) -> Result<()> {
        println!("/{}", self.path.join("/"));
        Ok(())
    }

    fn ls(&self, long: bool) -> Result<()> {
        let fs = self.fs();
        let dir = self.cwd();
        let mut lines = Vec::new();
        dir.as_dir()?.read_dir(&mut DirCursor::new(), |entry| {
            lines.push((entry.name_lossy().into_owned(), entry.inode_number));
            true
        })?;
        if !long {
            let names: Vec<_> = lines.into_iter().map(|(name, _)| name).collect();
            println!("{}", names.join(" "));
            return Ok(());
        }
        for (name, ino) in lines {
            // 目录项不记录类型, 需要读取目标inode
            match fs.stat(ino) {
                std::result::Result::Ok(attr) => println!("{} {name}", Self::describe(&attr)),
                Err(err) => println!("?????????? {ino:>6} {name} ({err})"),
            }
        }
        Ok(())
    }

    fn describe(attr: &InodeAttr) -> String {
        let ty = match attr.kind {
            InodeKind::Directory => 'd',
            InodeKind::Regular => '-',
            InodeKind::Other => '?',
        };
        format!(
            "{ty}{:04o} {:>6} {:>3} {:>5} {:>5} {:>8}",
            attr.mode.permissions(),
            attr.ino,
            attr.nlink,
            attr.uid,
            attr.gid,
            attr.size
        )
    }

    fn stat(&self, name: &str) -> Result<()> {
        let node = self.walk(name)?;
        let attr = node.attr();
        println!("  ino: {}", attr.ino);
        println!(" kind: {:?}", attr.kind);
        println!(" mode: {:o}", attr.mode.bits());
        println!("links: {}", attr.nlink);
        println!("  uid: {}  gid: {}", attr.uid, attr.gid);
        println!(" size: {} ({} blocks)", attr.size, attr.blocks);
        println!("  ver: {}", attr.version);
        println!("mtime: {}.{:06}", attr.mtime.as_secs(), attr.mtime.subsec_micros());
        println!("ctime: {}.{:06}", attr.ctime.as_secs(), attr.ctime.subsec_micros());
        Ok(())
    }

    fn cat(&self, name: &str) -> Result<()> {
        let node = self.walk(name)?;
        let data = node.as_file()?.read_all()?;
        println!("{}", String::from_utf8_lossy(&data));
        Ok(())
    }

    fn parse_bmap<'a>(&self, leftover: &'a str) -> Result<(&'a str, u64)> {
        let mut split = leftover.split_whitespace();
        let name = split.next().ok_or_else(|| anyhow!("missing name"))?;
        let block = split
            .next()
            .ok_or_else(|| anyhow!("missing logical block"))?
            .parse()?;
        if split.next().is_some() {
            Err(anyhow!("too many arguments"))
        } else {
            Ok((name, block))
        }
    }

    fn bmap(&self, name: &str, block: u64) -> Result<()> {
        let node = self.walk(name)?;
        let physical = self.fs.bmap(node.ino(), block)?;
        println!("logical {block} -> physical {physical}");
        Ok(())
    }

    fn imap(&self, ino: u64) -> Result<()> {
        let entry = self
            .fs
            .imap()
            .lookup(ino)
            .ok_or_else(|| anyhow!("ino {ino} is not in the inode map"))?;
        let (block, offset) = entry.location();
        println!("ino {ino} -> byte {:#x} (block {block}, offset {offset})", entry.byte_addr);
        Ok(())
    }

    fn open(&mut self, name: &str) -> Result<()> {
        let node = self.walk(name)?;
        let fd = self.fd_table.open(node)?;
        println!("open `{name}` with fd {fd}");
        Ok(())
    }

    fn close(&mut self, fd: Fd) -> Result<()> {
        self.fd_table.close(fd)?;
        println!("close fd {fd}");
        Ok(())
    }

    fn parse_read(&mut self, leftover: &str) -> Result<(Fd, usize)> {
        let mut split = leftover.split_whitespace();
        let fd: Fd = split
            .next()
            .map(|fd| fd.parse())
            .ok_or_else(|| anyhow!("missing fd"))??;
        let size: usize = split
            .next()
            .map(|size| size.parse())
            .ok_or_else(|| anyhow!("missing size"))??;

        if split.next().is_some() {
            Err(anyhow!("too many arguments"))?
        } else {
            Ok((fd, size))
        }
    }

    fn read(&mut self, fd: Fd, size: usize) -> Result<()> {
        let mut buf = vec![0; size];
        let nread = self.fd_table.read(fd, &mut buf)?;
        let s = String::from_utf8_lossy(&buf[..nread]);
        println!("{s}\n");
        println!("read {} bytes from fd {fd}", nread);
        Ok(())
    }

    fn parse_seek(&mut self, leftover: &str) -> Result<(Fd, i64)> {
        let mut split = leftover.split_whitespace();
        let fd = split
            .next()
            .ok_or_else(|| anyhow!("missing fd"))?
            .parse::<Fd>()?;
        let step = split
            .next()
            .ok_or_else(|| anyhow!("missing offset"))?
            .parse::<i64>()?;
        if split.next().is_some() {
            Err(anyhow!("too many arguments"))
        } else {
            Ok((fd, step))
        }
    }

    fn seek(&mut self, fd: Fd, step: i64) -> Result<()> {
        let to = self.fd_table.seek(fd, step)?;
        println!("fd {fd} at {to}");
        Ok(())
    }

    fn stats(&self) -> Result<()> {
        let stats = self.fs.stats();
        println!("decodes:              {}", stats.decodes);
        println!("sibling fills:        {}", stats.sibling_fills);
        println!("inconsistent records: {}", stats.inconsistent_records);
        println!("orphan records:       {}", stats.orphan_records);
        println!("corrupt dirents:      {}", stats.corrupt_dirents);
        Ok(())
    }

    fn exit(&mut self) -> ! {
        if let Err(err) = self.fs.flush() {
            println!("flush failed: {err}");
        }
        println!("bye!");
        exit(0);
    }
}
