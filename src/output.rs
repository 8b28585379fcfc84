use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use bytemuck::{bytes_of, cast_slice, pod_read_unaligned};
use faer::Mat;

use crate::domain::SolutionDomain;
use crate::error::{ConfigError, SimError};
use crate::probe::{Probe, ProbeSection, ProbeVar};

pub(crate) const RESTART_MAGIC: &[u8; 4] = b"RFR1";
pub(crate) const SNAPSHOT_MAGIC: &[u8; 4] = b"RFS1";
pub(crate) const PROBE_MAGIC: &[u8; 4] = b"RFP1";

/// Recorder settings split out of the run configuration.
#[derive(Debug)]
pub struct RecorderConfig {
    pub out_dir: PathBuf,
    pub sim_label: String,
    pub num_steps: usize,
    pub dt: f64,
    pub start_iter: usize,
    pub out_interval: usize,
    pub restart_interval: usize,
    pub save_restarts: bool,
    pub run_steady: bool,
    pub steady_tol: f64,
}

/// Samples probes and snapshots on a fixed cadence, persists restart
/// files, and flushes everything at run termination, truncated to the
/// iterations that actually completed.
#[derive(Debug)]
pub struct Recorder {
    cfg: RecorderConfig,
    probes: Vec<Probe>,
    probe_vars: Vec<ProbeVar>,
    /// One `[num_probe_vars x num_steps]` buffer per probe; iteration
    /// `iter` writes column `iter - 1`.
    probe_vals: Vec<Mat<f64>>,
    time_vals: Vec<f64>,
    /// `[num_eqs * num_cells x 1 + num_steps / out_interval]`; column 0
    /// holds the initial condition.
    prim_snaps: Mat<f64>,
    cons_snaps: Mat<f64>,
    snaps_written: usize,
    steady_conv: Option<BufWriter<File>>,
}

impl Recorder {
    pub fn new(
        domain: &SolutionDomain,
        cfg: RecorderConfig,
        probe_locs: &[f64],
        probe_vars: Vec<ProbeVar>,
    ) -> Result<Self, SimError> {
        if cfg.out_interval == 0 {
            return Err(ConfigError::ZeroInterval { name: "out" }.into());
        }
        if cfg.restart_interval == 0 {
            return Err(ConfigError::ZeroInterval { name: "restart" }.into());
        }

        let probes: Vec<Probe> = probe_locs
            .iter()
            .map(|&loc| Probe::resolve(&domain.mesh, loc))
            .collect();
        for probe in &probes {
            for var in &probe_vars {
                var.validate(domain.gas.as_ref(), probe.section)?;
            }
        }

        let probe_vals = probes
            .iter()
            .map(|_| Mat::zeros(probe_vars.len(), cfg.num_steps))
            .collect();
        let time_vals = (0..cfg.num_steps)
            .map(|s| cfg.dt * (cfg.start_iter + s + 1) as f64)
            .collect();

        let ndof = domain.num_eqs() * domain.num_cells();
        let num_snaps = cfg.num_steps / cfg.out_interval;
        let mut prim_snaps = Mat::zeros(ndof, num_snaps + 1);
        let mut cons_snaps = Mat::zeros(ndof, num_snaps + 1);
        write_field_col(&mut prim_snaps, 0, &domain.sol_int.state.sol_prim);
        write_field_col(&mut cons_snaps, 0, &domain.sol_int.state.sol_cons);

        std::fs::create_dir_all(&cfg.out_dir)?;
        Ok(Self {
            cfg,
            probes,
            probe_vars,
            probe_vals,
            time_vals,
            prim_snaps,
            cons_snaps,
            snaps_written: 0,
            steady_conv: None,
        })
    }

    pub fn num_probes(&self) -> usize {
        self.probes.len()
    }

    /// Restart writes, probe sampling and (for unsteady runs) snapshot
    /// capture for one completed iteration.
    pub fn write_iter_outputs(
        &mut self,
        domain: &SolutionDomain,
        iter: usize,
    ) -> Result<(), SimError> {
        if self.cfg.save_restarts && iter % self.cfg.restart_interval == 0 {
            self.write_restart_file(domain, iter)?;
        }
        if !self.probes.is_empty() {
            self.update_probes(domain, iter);
        }
        if !self.cfg.run_steady && iter % self.cfg.out_interval == 0 {
            self.update_snapshots(domain);
        }
        Ok(())
    }

    /// Steady-mode diagnostics. Returns true once the solution-change
    /// norm has dropped below the steady tolerance, which terminates the
    /// outer run loop.
    pub fn write_steady_outputs(
        &mut self,
        domain: &SolutionDomain,
        iter: usize,
    ) -> Result<bool, SimError> {
        if iter % self.cfg.out_interval == 0 {
            self.write_steady_field(domain)?;
            let d_sol = domain.sol_int.d_sol_norm_l2;
            if self.steady_conv.is_none() {
                let path = self
                    .cfg
                    .out_dir
                    .join(format!("convergence_{}.dat", self.cfg.sim_label));
                self.steady_conv = Some(BufWriter::new(File::create(path)?));
            }
            if let Some(conv) = self.steady_conv.as_mut() {
                writeln!(conv, "{} {:.10e}", iter, d_sol)?;
                conv.flush()?;
            }
        }
        Ok(domain.sol_int.d_sol_norm_l2 < self.cfg.steady_tol)
    }

    /// Flush snapshot and probe buffers, truncated to the completed
    /// iteration count. Failed runs get a distinguishing filename marker
    /// so partial data is never mistaken for a clean result.
    pub fn write_final_outputs(
        &mut self,
        domain: &SolutionDomain,
        completed_iters: usize,
        solve_failed: bool,
    ) -> Result<(), SimError> {
        let label = if solve_failed {
            format!("{}_FAILED", self.cfg.sim_label)
        } else {
            self.cfg.sim_label.clone()
        };

        if !self.cfg.run_steady {
            self.write_snapshots(domain, &label)?;
        }
        if !self.probes.is_empty() {
            self.write_probes(completed_iters, &label)?;
        }
        Ok(())
    }

    /// Sample every configured probe into the slot for this iteration.
    pub fn update_probes(&mut self, domain: &SolutionDomain, iter: usize) {
        debug_assert!(iter >= 1 && iter <= self.time_vals.len());
        for (p, probe) in self.probes.iter().enumerate() {
            let (prim, cons, source, col) = match probe.section {
                ProbeSection::Inlet => (
                    &domain.sol_inlet.state.sol_prim,
                    &domain.sol_inlet.state.sol_cons,
                    None,
                    0,
                ),
                ProbeSection::Outlet => (
                    &domain.sol_outlet.state.sol_prim,
                    &domain.sol_outlet.state.sol_cons,
                    None,
                    0,
                ),
                ProbeSection::Interior => (
                    &domain.sol_int.state.sol_prim,
                    &domain.sol_int.state.sol_cons,
                    Some(&domain.sol_int.source),
                    probe.cell.unwrap_or(0),
                ),
            };
            for (v, var) in self.probe_vars.iter().enumerate() {
                self.probe_vals[p][(v, iter - 1)] = var.extract(prim, cons, source, col);
            }
        }
    }

    fn update_snapshots(&mut self, domain: &SolutionDomain) {
        let col = self.snaps_written + 1;
        if col < self.prim_snaps.ncols() {
            write_field_col(&mut self.prim_snaps, col, &domain.sol_int.state.sol_prim);
            write_field_col(&mut self.cons_snaps, col, &domain.sol_int.state.sol_cons);
            self.snaps_written += 1;
        }
    }

    fn write_snapshots(&self, domain: &SolutionDomain, label: &str) -> Result<(), io::Error> {
        let cols = self.snaps_written + 1;
        for (name, snaps) in [("sol_prim", &self.prim_snaps), ("sol_cons", &self.cons_snaps)] {
            let path = self.cfg.out_dir.join(format!("{name}_{label}.bin"));
            let mut out = BufWriter::new(File::create(path)?);
            write_header(
                &mut out,
                SNAPSHOT_MAGIC,
                &[
                    domain.num_eqs() as u32,
                    domain.num_cells() as u32,
                    cols as u32,
                ],
            )?;
            for j in 0..cols {
                out.write_all(cast_slice(snaps.col_as_slice(j)))?;
            }
            out.flush()?;
        }
        Ok(())
    }

    fn write_probes(&self, completed_iters: usize, label: &str) -> Result<(), io::Error> {
        let completed = completed_iters.min(self.time_vals.len());
        let mut base = String::from("probe");
        for var in &self.probe_vars {
            base.push('_');
            base.push_str(&var.to_string());
        }
        for (p, vals) in self.probe_vals.iter().enumerate() {
            let path = self
                .cfg
                .out_dir
                .join(format!("{}_{}_{}.bin", base, p + 1, label));
            let mut out = BufWriter::new(File::create(path)?);
            write_header(
                &mut out,
                PROBE_MAGIC,
                &[(1 + self.probe_vars.len()) as u32, completed as u32],
            )?;
            // one column per step: time, then the sampled variables
            for s in 0..completed {
                out.write_all(bytes_of(&self.time_vals[s]))?;
                for v in 0..self.probe_vars.len() {
                    out.write_all(bytes_of(&vals[(v, s)]))?;
                }
            }
            out.flush()?;
        }
        Ok(())
    }

    fn write_steady_field(&self, domain: &SolutionDomain) -> Result<(), io::Error> {
        let path = self
            .cfg
            .out_dir
            .join(format!("sol_prim_steady_{}.bin", self.cfg.sim_label));
        let mut out = BufWriter::new(File::create(path)?);
        let prim = &domain.sol_int.state.sol_prim;
        write_header(
            &mut out,
            SNAPSHOT_MAGIC,
            &[domain.num_eqs() as u32, domain.num_cells() as u32, 1],
        )?;
        for j in 0..prim.ncols() {
            out.write_all(cast_slice(prim.col_as_slice(j)))?;
        }
        out.flush()
    }

    pub fn write_restart_file(
        &self,
        domain: &SolutionDomain,
        iter: usize,
    ) -> Result<(), io::Error> {
        let path = self.cfg.out_dir.join(format!("restart_{iter}.bin"));
        let abs_iter = self.cfg.start_iter + iter;
        let time = self.cfg.dt * abs_iter as f64;
        write_restart(
            &path,
            abs_iter,
            time,
            &domain.sol_int.state.sol_prim,
            &domain.sol_int.state.sol_cons,
        )
    }
}

fn write_field_col(snaps: &mut Mat<f64>, col: usize, field: &Mat<f64>) {
    let n = field.ncols();
    for e in 0..field.nrows() {
        for j in 0..n {
            snaps[(e * n + j, col)] = field[(e, j)];
        }
    }
}

fn write_header(out: &mut impl Write, magic: &[u8; 4], dims: &[u32]) -> Result<(), io::Error> {
    out.write_all(magic)?;
    out.write_all(bytes_of(&(std::mem::size_of::<f64>() as u8)))?;
    for d in dims {
        out.write_all(bytes_of(d))?;
    }
    Ok(())
}

/// Restart record: enough to resume the interior state exactly.
pub struct RestartState {
    pub iter: usize,
    pub time: f64,
    pub sol_prim: Mat<f64>,
    pub sol_cons: Mat<f64>,
}

pub fn write_restart(
    path: &Path,
    iter: usize,
    time: f64,
    sol_prim: &Mat<f64>,
    sol_cons: &Mat<f64>,
) -> Result<(), io::Error> {
    let mut out = BufWriter::new(File::create(path)?);
    write_header(
        &mut out,
        RESTART_MAGIC,
        &[
            sol_prim.nrows() as u32,
            sol_prim.ncols() as u32,
            iter as u32,
        ],
    )?;
    out.write_all(bytes_of(&time))?;
    for m in [sol_prim, sol_cons] {
        for j in 0..m.ncols() {
            out.write_all(cast_slice(m.col_as_slice(j)))?;
        }
    }
    out.flush()
}

pub fn read_restart_file(path: &Path) -> Result<RestartState, SimError> {
    let buf = std::fs::read(path)?;
    let mut off = 0usize;
    let take = |off: &mut usize, n: usize| -> Result<std::ops::Range<usize>, SimError> {
        if *off + n > buf.len() {
            return Err(SimError::Malformed("restart file truncated"));
        }
        let r = *off..*off + n;
        *off += n;
        Ok(r)
    };

    if buf[take(&mut off, 4)?] != *RESTART_MAGIC {
        return Err(SimError::Malformed("bad restart magic"));
    }
    let width = buf[take(&mut off, 1)?.start];
    if width as usize != std::mem::size_of::<f64>() {
        return Err(SimError::Malformed("unsupported float width"));
    }
    let num_eqs = pod_read_unaligned::<u32>(&buf[take(&mut off, 4)?]) as usize;
    let num_cells = pod_read_unaligned::<u32>(&buf[take(&mut off, 4)?]) as usize;
    let iter = pod_read_unaligned::<u32>(&buf[take(&mut off, 4)?]) as usize;
    let time = pod_read_unaligned::<f64>(&buf[take(&mut off, 8)?]);

    let read_mat = |off: &mut usize| -> Result<Mat<f64>, SimError> {
        let mut m = Mat::zeros(num_eqs, num_cells);
        for j in 0..num_cells {
            for i in 0..num_eqs {
                m[(i, j)] = pod_read_unaligned::<f64>(&buf[take(off, 8)?]);
            }
        }
        Ok(m)
    };
    let sol_prim = read_mat(&mut off)?;
    let sol_cons = read_mat(&mut off)?;

    Ok(RestartState {
        iter,
        time,
        sol_prim,
        sol_cons,
    })
}

/// Probe file contents, mainly for post-processing and tests.
pub struct ProbeData {
    /// `[1 + num_probe_vars x num_steps_completed]`; row 0 is time.
    pub data: Mat<f64>,
}

pub fn read_probe_file(path: &Path) -> Result<ProbeData, SimError> {
    let buf = std::fs::read(path)?;
    if buf.len() < 13 || buf[0..4] != *PROBE_MAGIC {
        return Err(SimError::Malformed("bad probe magic"));
    }
    if buf[4] as usize != std::mem::size_of::<f64>() {
        return Err(SimError::Malformed("unsupported float width"));
    }
    let rows = pod_read_unaligned::<u32>(&buf[5..9]) as usize;
    let cols = pod_read_unaligned::<u32>(&buf[9..13]) as usize;
    let payload = &buf[13..];
    if payload.len() != rows * cols * 8 {
        return Err(SimError::Malformed("probe payload size mismatch"));
    }
    let data = Mat::from_fn(rows, cols, |i, j| {
        let k = (j * rows + i) * 8;
        pod_read_unaligned::<f64>(&payload[k..k + 8])
    });
    Ok(ProbeData { data })
}
