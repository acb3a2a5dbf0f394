//! # measure-engine
//!
//! Hardware-rooted measurement of the configuration directory.
//!
//! Every device of a fleet running the same software must end up with the
//! same PCR value for the same configuration state. The engine gets there
//! by measuring a device-independent set of paths in a fixed order, with a
//! payload that depends only on path, presence and content.
//!
//! ## Data Flow
//!
//! ```text
//! classify(config_root, policy)           -> Inventory (unordered)
//! Tpm::allocated_banks()                  -> AlgorithmSet
//! Measurer::measure_all(sorted entries)   -> extend* + read-back per file
//! EventLog::append(record)                -> one EV_IPL event per file
//! EventLog::write_atomic(log_path)        -> temp file, sync, rename
//! ```
//!
//! Any failure aborts the run. The PCR cannot be rolled back, so a device
//! whose run failed must be reset before its PCR is trusted again.
//!
//! ## Verification
//!
//! [`EventLog::parse`] and [`replay`] recompute the PCR from a written log,
//! which is what a remote verifier does with the attested value.

pub mod classify;
pub mod config;
pub mod eventlog;
pub mod hash;
pub mod measure;

pub use classify::classify;
pub use config::MeasureConfig;
pub use eventlog::{replay, EventLog, EventType, LogEvent};
pub use measure::Measurer;

use measure_core::{AlgorithmSet, DigestMap, Result};
use measure_tpm::{open_device, Tpm};
use std::path::PathBuf;
use tracing::{info, warn};

/// What a completed run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Where the event log was written
    pub log_path: PathBuf,
    /// Number of measurement events, excluding the header
    pub events: usize,
    /// PCR value per bank after the last extend
    pub final_digests: DigestMap,
}

/// Result of [`run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The directory was measured and the log written
    Measured(RunSummary),
    /// No TPM on this machine; nothing was extended or written
    TpmAbsent,
}

/// Measure the configuration directory into `tpm` and build the event log.
///
/// The log is returned, not written. Entries are measured in sorted path
/// order; the first failure aborts.
///
/// # Errors
///
/// Any classification, hashing or TPM error, wrapped with the path of the
/// file being measured where there is one.
pub fn measure<T: Tpm + ?Sized>(config: &MeasureConfig, tpm: &mut T) -> Result<EventLog> {
    config.validate()?;

    let inventory = classify(&config.config_root, &config.policy)?;
    info!(
        root = %config.config_root.display(),
        files = inventory.len(),
        "inventory built"
    );

    let algorithms = AlgorithmSet::from_banks(tpm.allocated_banks()?)?;
    let banks: Vec<String> = algorithms.algorithms().map(|a| a.to_string()).collect();
    info!(banks = %banks.join(","), "active PCR banks");

    let records = Measurer::new(tpm, config.pcr_index, &algorithms)
        .with_max_event_size(config.max_event_size)?
        .measure_all(&inventory)?;

    let mut log = EventLog::new(&algorithms);
    for record in &records {
        log.append(config.pcr_index, record);
    }
    Ok(log)
}

/// Measure and write the event log to `config.log_path`.
///
/// # Errors
///
/// As [`measure`], plus `MeasureError::Io` if the log cannot be written.
/// No log file is left behind on error.
pub fn measure_and_write<T: Tpm + ?Sized>(
    config: &MeasureConfig,
    tpm: &mut T,
) -> Result<RunSummary> {
    let result = measure(config, tpm).and_then(|log| {
        log.write_atomic(&config.log_path)?;
        Ok(log)
    });

    let log = match result {
        Ok(log) => log,
        Err(e) => {
            warn!(pcr = %config.pcr_index, "measurement aborted, PCR must be reset before it is trusted");
            return Err(e);
        }
    };

    let summary = RunSummary {
        log_path: config.log_path.clone(),
        events: log.events().len(),
        final_digests: log
            .events()
            .last()
            .map(|e| e.digests.clone())
            .unwrap_or_default(),
    };
    info!(
        path = %summary.log_path.display(),
        events = summary.events,
        "event log written"
    );
    Ok(summary)
}

/// Open the TPM at `config.device_path` and run a full measurement.
///
/// A missing device node is not an error: the run is skipped and
/// [`RunOutcome::TpmAbsent`] returned. The device is closed when this
/// returns, on every path.
///
/// # Errors
///
/// Any error other than the device being absent.
pub fn run(config: &MeasureConfig) -> Result<RunOutcome> {
    let mut tpm = match open_device(&config.device_path) {
        Ok(tpm) => tpm,
        Err(e) if e.is_environment_absence() => {
            info!(device = %config.device_path.display(), "no TPM present, skipping measurement");
            return Ok(RunOutcome::TpmAbsent);
        }
        Err(e) => return Err(e),
    };

    measure_and_write(config, &mut tpm).map(RunOutcome::Measured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use measure_core::{HashAlgorithm, MeasureError, MeasurePolicy, PcrIndex};
    use measure_tpm::SimulatedTpm;
    use std::fs;
    use std::path::Path;

    const ALGS: [HashAlgorithm; 2] = [HashAlgorithm::Sha1, HashAlgorithm::Sha256];
    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn p(root: &Path, name: &str) -> String {
        root.join(name).to_str().unwrap().to_string()
    }

    /// Config rooted in a scratch dir, with the example policy lists
    fn scratch_config(dir: &Path) -> MeasureConfig {
        let root = dir.join("config");
        fs::create_dir_all(&root).unwrap();
        MeasureConfig {
            policy: MeasurePolicy::new(
                vec![p(&root, "tpm_credential")],
                vec![p(&root, "bootstrap-config.pb")],
            ),
            log_path: dir.join("run/measurefs/tpm_log.bin"),
            device_path: dir.join("tpmrm0"),
            config_root: root,
            ..MeasureConfig::default()
        }
    }

    fn payloads(log: &EventLog) -> Vec<String> {
        log.events()
            .iter()
            .map(|e| e.payload().unwrap().to_string())
            .collect()
    }

    #[test]
    fn example_scenario_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let config = scratch_config(dir.path());
        fs::write(config.config_root.join("a.txt"), "hello").unwrap();
        fs::write(config.config_root.join("tpm_credential"), "secret").unwrap();

        let mut tpm = SimulatedTpm::new(&ALGS).unwrap();
        let log = measure(&config, &mut tpm).unwrap();

        let root = &config.config_root;
        assert_eq!(
            payloads(&log),
            vec![
                format!("file:{} exist:true content-hash:{HELLO_SHA256}", p(root, "a.txt")),
                format!("file:{} exist:false", p(root, "bootstrap-config.pb")),
                format!("file:{} exist:true", p(root, "tpm_credential")),
            ]
        );
        assert_eq!(tpm.extend_calls().len(), 3);
    }

    #[test]
    fn identical_trees_give_identical_logs() {
        let dir = tempfile::tempdir().unwrap();
        let config = scratch_config(dir.path());
        fs::write(config.config_root.join("a.txt"), "hello").unwrap();
        fs::create_dir_all(config.config_root.join("GlobalConfig")).unwrap();
        fs::write(config.config_root.join("GlobalConfig/x.json"), "{}").unwrap();

        let mut first = SimulatedTpm::new(&ALGS).unwrap();
        let mut second = SimulatedTpm::new(&ALGS).unwrap();
        let one = measure(&config, &mut first).unwrap();
        let two = measure(&config, &mut second).unwrap();

        assert_eq!(one.to_bytes(), two.to_bytes());
        for alg in ALGS {
            assert_eq!(
                first.pcr_value(PcrIndex::CONFIG, alg),
                second.pcr_value(PcrIndex::CONFIG, alg)
            );
        }
    }

    #[test]
    fn creation_order_does_not_matter() {
        let dir = tempfile::tempdir().unwrap();
        let config = scratch_config(dir.path());
        let names = ["zeta", "Alpha", "mid/inner", "alpha"];
        fs::create_dir_all(config.config_root.join("mid")).unwrap();

        for name in names {
            fs::write(config.config_root.join(name), name).unwrap();
        }
        let mut tpm = SimulatedTpm::new(&ALGS).unwrap();
        let forward = measure(&config, &mut tpm).unwrap();

        for name in names {
            fs::remove_file(config.config_root.join(name)).unwrap();
        }
        for name in names.iter().rev() {
            fs::write(config.config_root.join(name), name).unwrap();
        }
        let mut tpm = SimulatedTpm::new(&ALGS).unwrap();
        let reverse = measure(&config, &mut tpm).unwrap();

        assert_eq!(payloads(&forward), payloads(&reverse));
    }

    #[test]
    fn policy_paths_always_present() {
        let dir = tempfile::tempdir().unwrap();
        let config = scratch_config(dir.path());

        let mut tpm = SimulatedTpm::new(&ALGS).unwrap();
        let log = measure(&config, &mut tpm).unwrap();
        let root = &config.config_root;
        assert_eq!(
            payloads(&log),
            vec![
                format!("file:{} exist:false", p(root, "bootstrap-config.pb")),
                format!("file:{} exist:false", p(root, "tpm_credential")),
            ]
        );
    }

    #[test]
    fn written_log_replays_to_live_pcr() {
        let dir = tempfile::tempdir().unwrap();
        let config = scratch_config(dir.path());
        fs::write(config.config_root.join("a.txt"), "hello").unwrap();
        fs::write(config.config_root.join("big"), vec![b'x'; 4096]).unwrap();

        let mut tpm = SimulatedTpm::new(&ALGS).unwrap();
        let summary = measure_and_write(&config, &mut tpm).unwrap();
        assert_eq!(summary.events, 4);

        let log = EventLog::parse(&fs::read(&summary.log_path).unwrap()).unwrap();
        let replayed = replay(&log, config.max_event_size).unwrap();
        for alg in ALGS {
            let live = tpm.pcr_value(PcrIndex::CONFIG, alg);
            assert_eq!(replayed.get(alg).unwrap(), live.as_slice());
            assert_eq!(summary.final_digests.get(alg).unwrap(), live.as_slice());
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_file_name_is_measured_not_fatal() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let config = scratch_config(dir.path());
        let bad = config.config_root.join(OsStr::from_bytes(b"bad\xff"));
        fs::write(&bad, "hello").unwrap();

        let mut tpm = SimulatedTpm::new(&ALGS).unwrap();
        let summary = measure_and_write(&config, &mut tpm).unwrap();
        assert_eq!(summary.events, 3);

        let log = EventLog::parse(&fs::read(&summary.log_path).unwrap()).unwrap();
        let mut expected = b"file:".to_vec();
        expected.extend_from_slice(bad.as_os_str().as_bytes());
        expected.extend_from_slice(format!(" exist:true content-hash:{HELLO_SHA256}").as_bytes());
        assert_eq!(log.events()[0].payload_bytes(), expected.as_slice());
        assert_eq!(log.events()[0].payload(), None);
        assert_eq!(tpm.extend_calls()[0].data, expected);

        let replayed = replay(&log, config.max_event_size).unwrap();
        for alg in ALGS {
            assert_eq!(
                replayed.get(alg).unwrap(),
                tpm.pcr_value(PcrIndex::CONFIG, alg).as_slice()
            );
        }
    }

    #[test]
    fn bank_order_drives_digest_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = scratch_config(dir.path());

        let mut tpm = SimulatedTpm::new(&[HashAlgorithm::Sha384, HashAlgorithm::Sha1])
            .unwrap()
            .with_empty_bank(HashAlgorithm::Sha256);
        let log = measure(&config, &mut tpm).unwrap();

        let header: Vec<u16> = log
            .spec_id()
            .digest_sizes
            .iter()
            .map(|s| s.algorithm_id)
            .collect();
        assert_eq!(header, vec![0x000C, 0x0004]);
        let order: Vec<_> = log.events()[0].digests.iter().map(|d| d.algorithm).collect();
        assert_eq!(order, vec![HashAlgorithm::Sha384, HashAlgorithm::Sha1]);
    }

    #[test]
    fn no_allocated_banks_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let config = scratch_config(dir.path());
        let mut tpm = SimulatedTpm::new(&[])
            .unwrap()
            .with_empty_bank(HashAlgorithm::Sha256);
        assert!(matches!(
            measure(&config, &mut tpm),
            Err(MeasureError::NoActiveBanks)
        ));
        assert!(tpm.extend_calls().is_empty());
    }

    #[test]
    fn extend_failure_leaves_no_log() {
        let dir = tempfile::tempdir().unwrap();
        let config = scratch_config(dir.path());

        let mut tpm = SimulatedTpm::new(&ALGS).unwrap().fail_extend_after(1);
        let err = measure_and_write(&config, &mut tpm).unwrap_err();
        assert!(err.is_hardware());
        assert!(err.to_string().contains("tpm_credential"));
        assert!(!config.log_path.exists());
    }

    #[test]
    fn unreadable_root_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = scratch_config(dir.path());
        config.config_root = dir.path().join("missing");

        let mut tpm = SimulatedTpm::new(&ALGS).unwrap();
        assert!(matches!(
            measure(&config, &mut tpm),
            Err(MeasureError::Io { .. })
        ));
    }

    #[test]
    fn run_without_device_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let config = scratch_config(dir.path());
        fs::write(config.config_root.join("a.txt"), "hello").unwrap();

        assert_eq!(run(&config).unwrap(), RunOutcome::TpmAbsent);
        assert!(!config.log_path.exists());
    }
}
