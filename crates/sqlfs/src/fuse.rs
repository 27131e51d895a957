//! FUSE binding.
//!
//! [`FuseAdapter`] implements [`fuser::Filesystem`] by forwarding each
//! kernel request to a [`VfsOps`] implementation. fuser calls in on its own
//! thread; async operations are driven with the tokio runtime handle the
//! adapter was built with. Errors are answered with [`VfsError::errno`].

use std::ffi::OsStr;
use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use fuser::{
    FileType as FuseFileType, Filesystem, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use tokio::runtime::Handle;

use sqlfs_kernel::{FileAttr, FileType, Owner, SetAttr, SetTime, VfsError, VfsOps, VfsResult};

use crate::config::MountSettings;

/// Nothing is cached in the kernel; every request reaches the store.
const TTL: Duration = Duration::ZERO;
const GENERATION: u64 = 0;
const BLOCK_SIZE: u32 = 512;

/// Convert to the attribute structure fuser replies with.
pub fn to_fuse_attr(attr: &FileAttr) -> fuser::FileAttr {
    fuser::FileAttr {
        ino: attr.ino,
        size: attr.size,
        blocks: attr.size.div_ceil(u64::from(BLOCK_SIZE)),
        atime: attr.atime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        crtime: attr.ctime,
        kind: to_fuse_kind(attr.kind),
        perm: attr.perm() as u16,
        nlink: attr.nlink(),
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

fn to_fuse_kind(kind: FileType) -> FuseFileType {
    match kind {
        FileType::File => FuseFileType::RegularFile,
        FileType::Directory => FuseFileType::Directory,
    }
}

fn to_set_time(t: TimeOrNow) -> SetTime {
    match t {
        TimeOrNow::Now => SetTime::Now,
        TimeOrNow::SpecificTime(t) => SetTime::At(t),
    }
}

/// Names must be UTF-8 to be stored.
fn utf8_name(name: &OsStr) -> Result<&str, i32> {
    name.to_str()
        .ok_or_else(|| VfsError::invalid_name(name.to_string_lossy()).errno())
}

/// Serves a [`VfsOps`] implementation to the kernel.
pub struct FuseAdapter {
    vfs: Arc<dyn VfsOps>,
    runtime: Handle,
}

impl FuseAdapter {
    pub fn new(vfs: Arc<dyn VfsOps>, runtime: Handle) -> Self {
        Self { vfs, runtime }
    }

    /// Drive `fut` to completion on the runtime, mapping failures to errno.
    fn run<T>(&self, op: &'static str, fut: impl Future<Output = VfsResult<T>>) -> Result<T, i32> {
        self.runtime.block_on(fut).map_err(|e| {
            if e.is_not_found() {
                tracing::debug!(op, error = %e, "request failed");
            } else {
                tracing::warn!(op, error = %e, "request failed");
            }
            e.errno()
        })
    }
}

impl Filesystem for FuseAdapter {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str() else {
            reply.error(VfsError::not_found("").errno());
            return;
        };
        match self.run("lookup", self.vfs.lookup(parent, name)) {
            Ok(attr) => reply.entry(&TTL, &to_fuse_attr(&attr), GENERATION),
            Err(errno) => reply.error(errno),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        match self.run("getattr", self.vfs.getattr(ino)) {
            Ok(attr) => reply.attr(&TTL, &to_fuse_attr(&attr)),
            Err(errno) => reply.error(errno),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let set = SetAttr {
            uid,
            gid,
            perm: mode,
            atime: atime.map(to_set_time),
            mtime: mtime.map(to_set_time),
            size,
        };
        match self.run("setattr", self.vfs.setattr(ino, set)) {
            Ok(attr) => reply.attr(&TTL, &to_fuse_attr(&attr)),
            Err(errno) => reply.error(errno),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let children = match self.run("readdir", self.vfs.readdir(ino)) {
            Ok(children) => children,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };

        // The store does not track `..`; the kernel resolves it itself.
        let mut entries: Vec<(u64, FuseFileType, String)> = vec![
            (ino, FuseFileType::Directory, ".".to_string()),
            (ino, FuseFileType::Directory, "..".to_string()),
        ];
        entries.extend(
            children
                .into_iter()
                .map(|e| (e.ino, to_fuse_kind(e.kind), e.name)),
        );

        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, (ino, kind, name)) in entries.into_iter().enumerate().skip(skip) {
            if reply.add(ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn mkdir(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let name = match utf8_name(name) {
            Ok(name) => name,
            Err(errno) => return reply.error(errno),
        };
        let owner = Owner::new(req.uid(), req.gid());
        match self.run("mkdir", self.vfs.mkdir(parent, name, owner)) {
            Ok(attr) => reply.entry(&TTL, &to_fuse_attr(&attr), GENERATION),
            Err(errno) => reply.error(errno),
        }
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let name = match utf8_name(name) {
            Ok(name) => name,
            Err(errno) => return reply.error(errno),
        };
        let owner = Owner::new(req.uid(), req.gid());
        match self.run("create", self.vfs.create(parent, name, owner)) {
            Ok(attr) => reply.created(&TTL, &to_fuse_attr(&attr), GENERATION, 0, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let name = match utf8_name(name) {
            Ok(name) => name,
            Err(errno) => return reply.error(errno),
        };
        match self.run("unlink", self.vfs.unlink(parent, name)) {
            Ok(()) => reply.ok(),
            Err(errno) => reply.error(errno),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let name = match utf8_name(name) {
            Ok(name) => name,
            Err(errno) => return reply.error(errno),
        };
        match self.run("rmdir", self.vfs.rmdir(parent, name)) {
            Ok(()) => reply.ok(),
            Err(errno) => reply.error(errno),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.run("open", self.vfs.open(ino)) {
            Ok(_) => reply.opened(0, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let offset = u64::try_from(offset).unwrap_or(0);
        match self.run("read", self.vfs.read_range(ino, offset, size)) {
            Ok(data) => reply.data(&data),
            Err(errno) => reply.error(errno),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let offset = match write_offset(offset) {
            Ok(offset) => offset,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };
        match self.run("write", self.vfs.write(ino, offset, data)) {
            Ok(written) => reply.written(written),
            Err(errno) => reply.error(errno),
        }
    }
}

fn write_offset(offset: i64) -> Result<u64, i32> {
    u64::try_from(offset)
        .map_err(|_| VfsError::invalid_argument(format!("negative write offset {offset}")).errno())
}

/// fuser mount options for `settings`.
pub fn mount_options(settings: &MountSettings) -> Vec<MountOption> {
    let mut options = vec![
        MountOption::FSName(settings.fsname.clone()),
        MountOption::Subtype("sqlfs".to_string()),
        MountOption::DefaultPermissions,
    ];
    if settings.auto_unmount {
        options.push(MountOption::AutoUnmount);
    }
    if settings.allow_other {
        options.push(MountOption::AllowOther);
    }
    options
}

/// Serve `vfs` at `mountpoint` until it is unmounted.
///
/// Blocks the calling thread, which must not be a runtime worker.
pub fn mount(
    vfs: Arc<dyn VfsOps>,
    mountpoint: &Path,
    settings: &MountSettings,
    runtime: Handle,
) -> io::Result<()> {
    let adapter = FuseAdapter::new(vfs, runtime);
    fuser::mount2(adapter, mountpoint, &mount_options(settings))
}
