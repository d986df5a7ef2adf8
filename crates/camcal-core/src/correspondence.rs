use std::path::{Path, PathBuf};

use nalgebra::{Point2, Point3};

use crate::backend::ImageSize;

/// One accepted view: the board template paired with its detected corners.
#[derive(Clone, Debug)]
pub struct View {
    /// Position of the source image in the enumerated input list.
    pub image_index: usize,
    pub path: PathBuf,
    pub image_points: Vec<Point2<f32>>,
}

/// 2D/3D correspondences accumulated over a calibration run.
///
/// Object and image point sets are stored in parallel, index-aligned
/// sequences and can only grow together through [`Correspondences::push`].
#[derive(Clone, Debug, Default)]
pub struct Correspondences {
    object_points: Vec<Vec<Point3<f32>>>,
    image_points: Vec<Vec<Point2<f32>>>,
    sources: Vec<(usize, PathBuf)>,
    last_image_size: Option<ImageSize>,
}

impl Correspondences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one accepted view.
    pub fn push(
        &mut self,
        image_index: usize,
        path: &Path,
        object_points: Vec<Point3<f32>>,
        image_points: Vec<Point2<f32>>,
    ) {
        self.object_points.push(object_points);
        self.image_points.push(image_points);
        self.sources.push((image_index, path.to_path_buf()));
    }

    /// Remember the size of the most recently loaded image, accepted or not.
    pub fn note_image_size(&mut self, size: ImageSize) {
        self.last_image_size = Some(size);
    }

    pub fn len(&self) -> usize {
        self.object_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_points.is_empty()
    }

    pub fn object_points(&self) -> &[Vec<Point3<f32>>] {
        &self.object_points
    }

    pub fn image_points(&self) -> &[Vec<Point2<f32>>] {
        &self.image_points
    }

    /// Pixel size the calibration solve runs against.
    pub fn last_image_size(&self) -> Option<ImageSize> {
        self.last_image_size
    }

    /// Index of the accepted view built from input image `image_index`.
    pub fn view_for_image(&self, image_index: usize) -> Option<usize> {
        self.sources.iter().position(|(idx, _)| *idx == image_index)
    }

    pub fn views(&self) -> impl Iterator<Item = View> + '_ {
        self.sources
            .iter()
            .zip(&self.image_points)
            .map(|((image_index, path), pts)| View {
                image_index: *image_index,
                path: path.clone(),
                image_points: pts.clone(),
            })
    }

    pub fn source_path(&self, view: usize) -> Option<&Path> {
        self.sources.get(view).map(|(_, p)| p.as_path())
    }
}
