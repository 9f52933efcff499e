//! Level views into expansion buffers.
use std::ops::{AddAssign, Range};

use crate::{
    fmm::types::{ExpansionBuffer, Expansions, ExpansionsMut},
    traits::types::{FmmError, FmmResult},
};

fn missing_box(ibox: usize, boxes: Range<usize>) -> FmmError {
    FmmError::MalformedTraversal {
        ibox,
        reason: format!(
            "no expansion for box in view of boxes {}..{}",
            boxes.start, boxes.end
        ),
    }
}

impl<C> ExpansionBuffer<C>
where
    C: Copy + Default,
{
    /// Zero initialised expansions for every box of a tree.
    ///
    /// # Arguments
    /// * `level_start_box_nrs` - First box number of each level, with a final entry equal to
    ///   the number of boxes.
    /// * `ncoeffs` - Number of coefficients per expansion.
    pub fn new(level_start_box_nrs: &[usize], ncoeffs: usize) -> Self {
        let nboxes = level_start_box_nrs.last().copied().unwrap_or(0);
        Self {
            data: vec![C::default(); nboxes * ncoeffs],
            level_start_box_nrs: level_start_box_nrs.to_vec(),
            ncoeffs,
        }
    }

    /// Number of boxes.
    pub fn nboxes(&self) -> usize {
        self.level_start_box_nrs.last().copied().unwrap_or(0)
    }

    /// Number of coefficients per expansion.
    pub fn ncoeffs(&self) -> usize {
        self.ncoeffs
    }

    /// Box numbers of a level, empty for levels outside of the tree.
    pub fn level_boxes(&self, level: u64) -> Range<usize> {
        let nboxes = self.nboxes();
        let level = level as usize;
        let start = self
            .level_start_box_nrs
            .get(level)
            .copied()
            .unwrap_or(nboxes);
        let end = self
            .level_start_box_nrs
            .get(level + 1)
            .copied()
            .unwrap_or(nboxes);
        start..end
    }

    /// View of all expansions.
    pub fn view(&self) -> Expansions<'_, C> {
        Expansions {
            first_box: 0,
            ncoeffs: self.ncoeffs,
            data: &self.data,
        }
    }

    /// View of the expansions of a level.
    pub fn level(&self, level: u64) -> Expansions<'_, C> {
        let boxes = self.level_boxes(level);
        Expansions {
            first_box: boxes.start,
            ncoeffs: self.ncoeffs,
            data: &self.data[boxes.start * self.ncoeffs..boxes.end * self.ncoeffs],
        }
    }

    /// Mutable view of the expansions of a level.
    pub fn level_mut(&mut self, level: u64) -> ExpansionsMut<'_, C> {
        let boxes = self.level_boxes(level);
        ExpansionsMut {
            first_box: boxes.start,
            ncoeffs: self.ncoeffs,
            data: &mut self.data[boxes.start * self.ncoeffs..boxes.end * self.ncoeffs],
        }
    }

    /// Views for translating `level + 1` into `level`, the children read only and the parents
    /// mutable.
    pub fn coarsen_views(&mut self, level: u64) -> (Expansions<'_, C>, ExpansionsMut<'_, C>) {
        let parents = self.level_boxes(level);
        let children = self.level_boxes(level + 1);
        let n = self.ncoeffs;

        let (head, tail) = self.data.split_at_mut(parents.end * n);
        let children = Expansions {
            first_box: parents.end,
            ncoeffs: n,
            data: &tail[..children.len() * n],
        };
        let parents = ExpansionsMut {
            first_box: parents.start,
            ncoeffs: n,
            data: &mut head[parents.start * n..],
        };

        (children, parents)
    }

    /// Views for translating `level - 1` into `level`, the parents read only and the children
    /// mutable.
    pub fn refine_views(&mut self, level: u64) -> (Expansions<'_, C>, ExpansionsMut<'_, C>) {
        let parents = self.level_boxes(level.saturating_sub(1));
        let children = self.level_boxes(level);
        let n = self.ncoeffs;

        let (head, tail) = self.data.split_at_mut(children.start * n);
        let parents = Expansions {
            first_box: parents.start,
            ncoeffs: n,
            data: &head[parents.start * n..],
        };
        let children = ExpansionsMut {
            first_box: children.start,
            ncoeffs: n,
            data: &mut tail[..children.len() * n],
        };

        (parents, children)
    }
}

impl<'a, C> Expansions<'a, C> {
    /// Number of boxes in the view.
    pub fn nboxes(&self) -> usize {
        if self.ncoeffs == 0 {
            0
        } else {
            self.data.len() / self.ncoeffs
        }
    }

    /// Number of coefficients per expansion.
    pub fn ncoeffs(&self) -> usize {
        self.ncoeffs
    }

    /// Box numbers in the view.
    pub fn boxes(&self) -> Range<usize> {
        self.first_box..self.first_box + self.nboxes()
    }

    /// Expansion of a box, `None` if the box isn't in the view.
    pub fn get(&self, ibox: usize) -> Option<&'a [C]> {
        if !self.boxes().contains(&ibox) {
            return None;
        }
        let offset = (ibox - self.first_box) * self.ncoeffs;
        Some(&self.data[offset..offset + self.ncoeffs])
    }

    /// Expansion of a box, an error if the box isn't in the view.
    pub fn try_get(&self, ibox: usize) -> FmmResult<&'a [C]> {
        self.get(ibox).ok_or_else(|| missing_box(ibox, self.boxes()))
    }
}

impl<'a, C> ExpansionsMut<'a, C> {
    /// Number of boxes in the view.
    pub fn nboxes(&self) -> usize {
        if self.ncoeffs == 0 {
            0
        } else {
            self.data.len() / self.ncoeffs
        }
    }

    /// Number of coefficients per expansion.
    pub fn ncoeffs(&self) -> usize {
        self.ncoeffs
    }

    /// Box numbers in the view.
    pub fn boxes(&self) -> Range<usize> {
        self.first_box..self.first_box + self.nboxes()
    }

    /// Read only reborrow.
    pub fn as_view(&self) -> Expansions<'_, C> {
        Expansions {
            first_box: self.first_box,
            ncoeffs: self.ncoeffs,
            data: &*self.data,
        }
    }

    /// Expansion of a box, `None` if the box isn't in the view.
    pub fn get_mut(&mut self, ibox: usize) -> Option<&mut [C]> {
        if !self.boxes().contains(&ibox) {
            return None;
        }
        let offset = (ibox - self.first_box) * self.ncoeffs;
        Some(&mut self.data[offset..offset + self.ncoeffs])
    }

    /// Add coefficients to the expansion of a box.
    pub fn accumulate(&mut self, ibox: usize, coefficients: &[C]) -> FmmResult<()>
    where
        C: Copy + AddAssign,
    {
        let ncoeffs = self.ncoeffs;
        if coefficients.len() != ncoeffs {
            return Err(FmmError::WranglerOperationFailure {
                ibox,
                reason: format!(
                    "expected {ncoeffs} coefficients, found {}",
                    coefficients.len()
                ),
            });
        }

        let boxes = self.boxes();
        let expansion = self
            .get_mut(ibox)
            .ok_or_else(|| missing_box(ibox, boxes))?;
        for (e, &c) in expansion.iter_mut().zip(coefficients) {
            *e += c;
        }
        Ok(())
    }
}
