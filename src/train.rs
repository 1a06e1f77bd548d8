use candle_core::Tensor;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::TrainConfig;
use crate::dataset::{Batch, InteractionDataset};
use crate::error::{PipelineError, Result};
use crate::model::{Mode, ModelShape, TwoTowerModel};

/// Binary cross-entropy on logits, mean over the batch.
///
/// Uses `max(x, 0) - x*y + ln(1 + e^-|x|)`, which never exponentiates a
/// positive number, so large logits neither overflow nor hit `ln(0)`.
pub fn bce_with_logits(logits: &Tensor, targets: &Tensor) -> candle_core::Result<Tensor> {
    let positive_part = logits.relu()?;
    let cross = (logits * targets)?;
    let soft_plus = logits.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    ((positive_part - cross)? + soft_plus)?.mean_all()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Initialized,
    Training { epoch: usize },
    Converged,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    pub epochs: usize,
    pub mean_loss: f32,
    pub batches: usize,
}

/// Result of a completed run.
pub struct TrainingOutcome {
    pub model: TwoTowerModel,
    pub history: Vec<EpochReport>,
}

impl TrainingOutcome {
    pub fn final_loss(&self) -> Option<f32> {
        self.history.last().map(|r| r.mean_loss)
    }
}

/// Mini-batch Adam over a fixed number of epochs. No resume: a failed run
/// starts over from a new `Trainer`.
pub struct Trainer<'a> {
    config: TrainConfig,
    dataset: &'a InteractionDataset,
    model: TwoTowerModel,
    optimizer: AdamW,
    rng: StdRng,
    state: TrainerState,
}

impl<'a> Trainer<'a> {
    pub fn new(
        config: TrainConfig,
        dataset: &'a InteractionDataset,
        num_users: usize,
        num_items: usize,
    ) -> Result<Self> {
        config.validate()?;
        if num_users == 0 || num_items == 0 || dataset.is_empty() {
            return Err(PipelineError::InsufficientData {
                users: num_users,
                items: num_items,
                examples: dataset.len(),
            });
        }

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let model = TwoTowerModel::new(ModelShape::new(num_users, num_items, &config), &mut rng)?;
        // Plain Adam: AdamW without decoupled weight decay.
        let optimizer = AdamW::new(
            model.vars(),
            ParamsAdamW {
                lr: config.learning_rate,
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;

        Ok(Self {
            config,
            dataset,
            model,
            optimizer,
            rng,
            state: TrainerState::Initialized,
        })
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn model(&self) -> &TwoTowerModel {
        &self.model
    }

    /// Run every epoch, reporting each through `on_epoch`.
    pub fn fit(mut self, on_epoch: Option<&dyn Fn(&EpochReport)>) -> Result<TrainingOutcome> {
        let mut history = Vec::with_capacity(self.config.epochs);
        for epoch in 1..=self.config.epochs {
            self.state = TrainerState::Training { epoch };
            let report = self.train_epoch(epoch)?;
            tracing::info!(
                epoch,
                epochs = self.config.epochs,
                loss = report.mean_loss,
                batches = report.batches,
                "epoch complete"
            );
            if let Some(callback) = on_epoch {
                callback(&report);
            }
            history.push(report);
        }
        self.state = TrainerState::Converged;

        Ok(TrainingOutcome {
            model: self.model,
            history,
        })
    }

    fn train_epoch(&mut self, epoch: usize) -> Result<EpochReport> {
        let dataset = self.dataset;
        let mut total_loss = 0.0f32;
        let mut batches = 0usize;
        for batch in dataset.shuffled_batches(self.config.batch_size, &mut self.rng) {
            total_loss += self.step(&batch)?;
            batches += 1;
        }
        Ok(EpochReport {
            epoch,
            epochs: self.config.epochs,
            mean_loss: total_loss / batches.max(1) as f32,
            batches,
        })
    }

    /// Forward, loss, backward, one optimizer update. Gradients are computed
    /// fresh from this batch's loss; nothing carries over between steps.
    fn step(&mut self, batch: &Batch) -> Result<f32> {
        let users = self.model.user_indices(&batch.users)?;
        let items = self.model.item_indices(&batch.items)?;
        let labels = Tensor::new(batch.labels.as_slice(), self.model.device())?;

        let logits = self.model.forward_tensors(&users, &items, Mode::Training)?;
        let loss = bce_with_logits(&logits, &labels)?;
        self.optimizer.backward_step(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrainingExample;

    fn naive_bce(x: f32, y: f32) -> f32 {
        let p = 1.0 / (1.0 + (-x).exp());
        -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
    }

    fn loss_of(logits: &[f32], targets: &[f32]) -> f32 {
        let dev = candle_core::Device::Cpu;
        let x = Tensor::new(logits, &dev).unwrap();
        let y = Tensor::new(targets, &dev).unwrap();
        bce_with_logits(&x, &y).unwrap().to_scalar::<f32>().unwrap()
    }

    /// 5 users x 3 items, label 1 when user and item share parity.
    fn separable() -> InteractionDataset {
        let mut examples = Vec::new();
        for u in 0..5u32 {
            for i in 0..3u32 {
                examples.push(TrainingExample {
                    user_index: u,
                    item_index: i,
                    label: if u % 2 == i % 2 { 1.0 } else { 0.0 },
                });
            }
        }
        InteractionDataset::new(examples)
    }

    #[test]
    fn fused_loss_matches_naive_form() {
        let logits = [-2.0, -0.5, 0.0, 0.7, 3.0];
        let targets = [0.0, 1.0, 0.5, 1.0, 0.0];
        let expected: f32 = logits
            .iter()
            .zip(&targets)
            .map(|(&x, &y)| naive_bce(x, y))
            .sum::<f32>()
            / logits.len() as f32;
        assert!((loss_of(&logits, &targets) - expected).abs() < 1e-5);
    }

    #[test]
    fn fused_loss_is_finite_for_extreme_logits() {
        let loss = loss_of(&[500.0, -500.0, 200.0], &[1.0, 0.0, 0.0]);
        assert!(loss.is_finite());
        assert!((loss - 200.0 / 3.0).abs() < 1e-3);
    }

    #[test]
    fn empty_spaces_are_insufficient() {
        let ds = separable();
        let err = Trainer::new(TrainConfig::default(), &ds, 0, 3).err().unwrap();
        assert!(matches!(err, PipelineError::InsufficientData { users: 0, .. }));

        let empty = InteractionDataset::default();
        let err = Trainer::new(TrainConfig::default(), &empty, 2, 2).err().unwrap();
        assert!(matches!(err, PipelineError::InsufficientData { examples: 0, .. }));
    }

    #[test]
    fn invalid_config_rejected_before_training() {
        let ds = separable();
        let config = TrainConfig { epochs: 0, ..Default::default() };
        assert!(matches!(
            Trainer::new(config, &ds, 5, 3).err().unwrap(),
            PipelineError::InvalidConfig(_)
        ));
    }

    #[test]
    fn state_moves_to_converged() {
        let ds = separable();
        let config = TrainConfig { epochs: 2, seed: Some(1), ..Default::default() };
        let trainer = Trainer::new(config, &ds, 5, 3).unwrap();
        assert_eq!(trainer.state(), TrainerState::Initialized);

        let outcome = trainer.fit(None).unwrap();
        assert_eq!(outcome.history.len(), 2);
        assert_eq!(outcome.history[1].epoch, 2);
        assert_eq!(outcome.history[0].batches, 1);
    }

    /// The 50% drop over 10 epochs holds for this setup (small batches,
    /// lr 1e-2, no dropout). Default hyperparameters only reach 35-40%.
    #[test]
    fn loss_halves_on_separable_data() {
        let ds = separable();
        let config = TrainConfig {
            epochs: 10,
            batch_size: 2,
            learning_rate: 1e-2,
            dropout: 0.0,
            seed: Some(42),
            ..Default::default()
        };
        let outcome = Trainer::new(config, &ds, 5, 3).unwrap().fit(None).unwrap();
        let losses: Vec<f32> = outcome.history.iter().map(|r| r.mean_loss).collect();
        assert!(losses.iter().all(|l| *l >= 0.0), "{losses:?}");
        assert!(losses[9] <= losses[0] * 0.5, "{losses:?}");
    }

    #[test]
    fn seeded_runs_repeat_exactly() {
        let ds = separable();
        let config = TrainConfig { epochs: 3, batch_size: 4, seed: Some(5), ..Default::default() };
        let run = || {
            Trainer::new(config.clone(), &ds, 5, 3)
                .unwrap()
                .fit(None)
                .unwrap()
                .history
                .iter()
                .map(|r| r.mean_loss)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn callback_sees_every_epoch() {
        let ds = separable();
        let config = TrainConfig { epochs: 3, seed: Some(2), ..Default::default() };
        let seen = std::cell::RefCell::new(Vec::new());
        let record = |r: &EpochReport| seen.borrow_mut().push(r.epoch);
        Trainer::new(config, &ds, 5, 3).unwrap().fit(Some(&record)).unwrap();
        assert_eq!(seen.into_inner(), vec![1, 2, 3]);
    }
}
