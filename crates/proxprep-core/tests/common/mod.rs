//! In-memory engine that records every call made by the data prepper.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use proxprep_core::config::PrepRequest;
use proxprep_core::{
    EngineError, FeatureClassRef, GeoEngine, GeodatabasePath, ProcessInputs, ProcessSummary, Wkid,
};

pub const DEFAULT_GDB: &str = "/data/Proximity_ON/Default.gdb";
pub const SCRATCH_GDB: &str = "/data/Proximity_ON/scratch.gdb";
pub const SITE_A: &str = "/data/EGDMP1A.gdb/EGD_MTNC_PD_A";
pub const ADV_PD: &str = "/data/EGDMP1A.gdb/EGD_MTNC_ADVPD_A";
pub const SITE_P: &str = "/data/site_p.gdb/site_p";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateGeodatabase(GeodatabasePath),
    Lock(GeodatabasePath),
    Unlock(GeodatabasePath),
    Reproject {
        src: FeatureClassRef,
        dst: FeatureClassRef,
        wkid: Wkid,
    },
    CopyRename {
        src: FeatureClassRef,
        dst: FeatureClassRef,
    },
    Process(ProcessInputs),
}

impl Call {
    /// Whether the call modifies a geodatabase.
    pub fn is_write(&self) -> bool {
        !matches!(self, Call::Lock(_) | Call::Unlock(_))
    }
}

pub struct RecordingLock {
    gdb: GeodatabasePath,
    calls: Rc<RefCell<Vec<Call>>>,
}

impl Drop for RecordingLock {
    fn drop(&mut self) {
        self.calls.borrow_mut().push(Call::Unlock(self.gdb.clone()));
    }
}

pub struct RecordingEngine {
    geodatabases: RefCell<HashSet<GeodatabasePath>>,
    layers: RefCell<HashMap<FeatureClassRef, Option<Wkid>>>,
    unwritable: HashSet<GeodatabasePath>,
    unlockable: HashSet<GeodatabasePath>,
    supported: HashSet<Wkid>,
    calls: Rc<RefCell<Vec<Call>>>,
    fail_process: bool,
}

pub fn wkid(code: u32) -> Wkid {
    Wkid::new(code).unwrap()
}

pub fn gdb(path: &str) -> GeodatabasePath {
    GeodatabasePath::new(path).unwrap()
}

pub fn fc(path: &str) -> FeatureClassRef {
    FeatureClassRef::parse(path).unwrap()
}

pub fn default_fc(name: &str) -> FeatureClassRef {
    fc(&format!("{DEFAULT_GDB}/{name}"))
}

pub fn request() -> PrepRequest {
    PrepRequest::new(
        gdb(DEFAULT_GDB),
        gdb(SCRATCH_GDB),
        fc(SITE_A),
        fc(ADV_PD),
        fc(SITE_P),
    )
}

impl RecordingEngine {
    /// Both geodatabases and all five source layers present, every layer in `native`.
    pub fn with_inputs(native: Wkid) -> Self {
        let engine = Self {
            geodatabases: RefCell::new([gdb(DEFAULT_GDB), gdb(SCRATCH_GDB)].into()),
            layers: RefCell::default(),
            unwritable: HashSet::new(),
            unlockable: HashSet::new(),
            supported: [4326, 3857, 3347, 32617].map(wkid).into(),
            calls: Rc::default(),
            fail_process: false,
        };
        for layer in [
            default_fc("Indigenous_autouc"),
            default_fc("bld_p"),
            fc(SITE_A),
            fc(ADV_PD),
            fc(SITE_P),
        ] {
            engine.set_layer(layer, Some(native));
        }
        engine
    }

    pub fn set_layer(&self, fc: FeatureClassRef, wkid: Option<Wkid>) {
        self.layers.borrow_mut().insert(fc, wkid);
    }

    pub fn remove_layer(&self, fc: &FeatureClassRef) {
        self.layers.borrow_mut().remove(fc);
    }

    pub fn remove_geodatabase(&self, gdb: &GeodatabasePath) {
        self.geodatabases.borrow_mut().remove(gdb);
    }

    pub fn mark_unwritable(&mut self, gdb: GeodatabasePath) {
        self.unwritable.insert(gdb);
    }

    /// Locking `gdb` fails as if the process lacked write access.
    pub fn deny_lock(&mut self, gdb: GeodatabasePath) {
        self.unlockable.insert(gdb);
    }

    pub fn fail_process(&mut self) {
        self.fail_process = true;
    }

    /// Spatial reference of a stored layer, `None` if absent or undefined.
    pub fn layer_wkid(&self, fc: &FeatureClassRef) -> Option<Wkid> {
        self.layers.borrow().get(fc).copied().flatten()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl GeoEngine for RecordingEngine {
    type Lock = RecordingLock;

    fn geodatabase_exists(&self, gdb: &GeodatabasePath) -> bool {
        self.geodatabases.borrow().contains(gdb)
    }

    fn exists(&self, fc: &FeatureClassRef) -> bool {
        self.layers.borrow().contains_key(fc)
    }

    fn is_writable(&self, gdb: &GeodatabasePath) -> Result<bool, EngineError> {
        Ok(!self.unwritable.contains(gdb))
    }

    fn create_geodatabase(&self, gdb: &GeodatabasePath) -> Result<(), EngineError> {
        self.record(Call::CreateGeodatabase(gdb.clone()));
        self.geodatabases.borrow_mut().insert(gdb.clone());
        Ok(())
    }

    fn lock_workspace(&self, gdb: &GeodatabasePath) -> Result<RecordingLock, EngineError> {
        if self.unlockable.contains(gdb) {
            return Err(EngineError::PermissionDenied {
                path: gdb.as_path().join(".proxprep.lock"),
            });
        }
        self.record(Call::Lock(gdb.clone()));
        Ok(RecordingLock {
            gdb: gdb.clone(),
            calls: Rc::clone(&self.calls),
        })
    }

    fn supports_spatial_reference(&self, wkid: Wkid) -> bool {
        self.supported.contains(&wkid)
    }

    fn spatial_reference_of(&self, fc: &FeatureClassRef) -> Result<Option<Wkid>, EngineError> {
        self.layers
            .borrow()
            .get(fc)
            .copied()
            .ok_or_else(|| EngineError::Operation {
                operation: "describe",
                message: format!("no layer {fc}"),
            })
    }

    fn reproject(
        &self,
        src: &FeatureClassRef,
        dst: &FeatureClassRef,
        wkid: Wkid,
    ) -> Result<(), EngineError> {
        self.record(Call::Reproject {
            src: src.clone(),
            dst: dst.clone(),
            wkid,
        });
        self.set_layer(dst.clone(), Some(wkid));
        Ok(())
    }

    fn copy_rename(&self, src: &FeatureClassRef, dst: &FeatureClassRef) -> Result<(), EngineError> {
        self.record(Call::CopyRename {
            src: src.clone(),
            dst: dst.clone(),
        });
        let wkid = self.layer_wkid(src);
        self.set_layer(dst.clone(), wkid);
        Ok(())
    }

    fn process(&self, inputs: &ProcessInputs) -> Result<ProcessSummary, EngineError> {
        self.record(Call::Process(inputs.clone()));
        if self.fail_process {
            return Err(EngineError::Operation {
                operation: "process",
                message: "injected failure".to_string(),
            });
        }
        self.set_layer(inputs.output.clone(), Some(inputs.spatial_reference));
        Ok(ProcessSummary {
            features_written: 3,
            ..ProcessSummary::default()
        })
    }
}
