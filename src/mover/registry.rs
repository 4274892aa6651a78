//! Dispatches a CR's mover configuration to the concrete `Mover`
//! implementation (spec §5.A). Both `ReplicationSourceSpec` and
//! `ReplicationDestinationSpec` carry the same set of optional per-mover
//! fragments, so a single trait + two small impls covers both.

use crate::crd::{
    ExternalSpec, KopiaSpec, RcloneSpec, ReplicationDestinationSpec, ReplicationSourceSpec,
    ResticSpec, RsyncSpec, RsyncTlsSpec, SyncthingSpec,
};
use crate::mover::kinds::{
    ExternalMover, KopiaMover, RcloneMover, ResticMover, RsyncMover, RsyncTlsMover, SyncthingMover,
};
use crate::mover::Mover;

/// Read-only access to the mover fragments common to both CR kinds.
pub trait MoverSpecProvider {
    fn rsync(&self) -> Option<&RsyncSpec>;
    fn rsync_tls(&self) -> Option<&RsyncTlsSpec>;
    fn rclone(&self) -> Option<&RcloneSpec>;
    fn restic(&self) -> Option<&ResticSpec>;
    fn kopia(&self) -> Option<&KopiaSpec>;
    fn syncthing(&self) -> Option<&SyncthingSpec>;
    fn external(&self) -> Option<&ExternalSpec>;
}

macro_rules! impl_provider {
    ($ty:ty) => {
        impl MoverSpecProvider for $ty {
            fn rsync(&self) -> Option<&RsyncSpec> {
                self.rsync.as_ref()
            }
            fn rsync_tls(&self) -> Option<&RsyncTlsSpec> {
                self.rsync_tls.as_ref()
            }
            fn rclone(&self) -> Option<&RcloneSpec> {
                self.rclone.as_ref()
            }
            fn restic(&self) -> Option<&ResticSpec> {
                self.restic.as_ref()
            }
            fn kopia(&self) -> Option<&KopiaSpec> {
                self.kopia.as_ref()
            }
            fn syncthing(&self) -> Option<&SyncthingSpec> {
                self.syncthing.as_ref()
            }
            fn external(&self) -> Option<&ExternalSpec> {
                self.external.as_ref()
            }
        }
    };
}

impl_provider!(ReplicationSourceSpec);
impl_provider!(ReplicationDestinationSpec);

/// Build the `Mover` configured on `spec`. Callers are expected to have
/// already validated (via `spec.mover_kind()`) that exactly one fragment is
/// set; this simply picks whichever is `Some` first.
pub fn build_mover(spec: &impl MoverSpecProvider) -> Box<dyn Mover> {
    if let Some(s) = spec.rsync() {
        return Box::new(RsyncMover { spec: s.clone() });
    }
    if let Some(s) = spec.rsync_tls() {
        return Box::new(RsyncTlsMover { spec: s.clone() });
    }
    if let Some(s) = spec.rclone() {
        return Box::new(RcloneMover { spec: s.clone() });
    }
    if let Some(s) = spec.restic() {
        return Box::new(ResticMover { spec: s.clone() });
    }
    if let Some(s) = spec.kopia() {
        return Box::new(KopiaMover { spec: s.clone() });
    }
    if let Some(s) = spec.syncthing() {
        return Box::new(SyncthingMover { spec: s.clone() });
    }
    if let Some(s) = spec.external() {
        return Box::new(ExternalMover { spec: s.clone() });
    }
    unreachable!("caller must validate exactly one mover is set before calling build_mover")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::RsyncSpec;

    #[test]
    fn picks_the_configured_mover() {
        let spec = ReplicationSourceSpec {
            source_pvc: "data".to_string(),
            trigger: None,
            paused: false,
            rsync: Some(RsyncSpec::default()),
            rsync_tls: None,
            rclone: None,
            restic: None,
            kopia: None,
            syncthing: None,
            external: None,
        };
        let mover = build_mover(&spec);
        assert_eq!(mover.name(), "rsync");
    }
}
