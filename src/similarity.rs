use crate::error::{Doc2TopicError, Result};
use crate::vocab::Vocabulary;

use ndarray::prelude::*;
use ndarray_stats::QuantileExt;

pub struct Similarity {
    w: Array2<f32>,
    normed: Array2<f32>,
    vocab: Vocabulary,
}

impl Similarity {

    pub fn new(w: Array2<f32>, vocab: Vocabulary) -> Result<Similarity> {

        if w.nrows() != vocab.len() {
            return Err(Doc2TopicError::Shape(format!(
                "inconsistent number of entries in w ({}) and tokens ({})", w.nrows(), vocab.len())));
        }

        // unit l2 rows so dot products are cosines, zero rows stay zero
        let mut normed = w.clone();
        for mut row in normed.axis_iter_mut(Axis(0)) {
            let norm = row.mapv(|a| a.powi(2)).sum().sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|a| a / norm);
            }
        }

        Ok(Self { w, normed, vocab })
    }

    pub fn extract_vec_from_word(&self, token: &str) -> Result<Array1<f32>> {
        let i = self.vocab.id_of(token)?;
        Ok(self.w.row(i).to_owned())
    }

    // The k words with highest cosine similarity to `vec`.
    pub fn find_k_most_similar(&self, vec: &Array1<f32>, k: usize) -> Vec<(String, f32)> {

        let norm = vec.mapv(|a| a.powi(2)).sum().sqrt();
        let scores = if norm > 0.0 { self.normed.dot(vec) / norm } else { Array1::zeros(self.normed.nrows()) };
        let mut indexed_scores: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();

        // sort by most similar in descending order
        indexed_scores.sort_by(|(i, s), (j, t)| t.total_cmp(s).then(i.cmp(j)));

        indexed_scores.into_iter()
            .take(k)
            .filter_map(|(index, score)| self.vocab.token(index).map(|t| (t.to_owned(), score)))
            .collect()
    }

    pub fn most_similar_words(&self, token: &str, k: usize) -> Result<Vec<(String, f32)>> {
        let vec = self.extract_vec_from_word(token)?;
        Ok(self.find_k_most_similar(&vec, k))
    }

    // Topic with the largest weight for `token`.
    pub fn dominant_topic(&self, token: &str) -> Result<usize> {
        let i = self.vocab.id_of(token)?;
        self.w.row(i).argmax().map_err(|e| Doc2TopicError::Shape(e.to_string()))
    }

}


#[cfg(test)]
mod tests {

    use super::*;
    use ndarray::array;

    fn toy() -> Similarity {
        let mut vocab = Vocabulary::new();
        for t in ["kuningas", "kuningatar", "auto", "tyhjä"] {
            vocab.insert_or_get(t);
        }
        let w = array![[1.0f32, 0.1], [0.9, 0.2], [0.0, 1.0], [0.0, 0.0]];
        Similarity::new(w, vocab).unwrap()
    }

    #[test]
    fn find_most_similar_test() {
        let sim = toy();
        let similar = sim.most_similar_words("kuningas", 2).unwrap();

        assert_eq!(similar[0].0, "kuningas");
        assert!((similar[0].1 - 1.0).abs() < 1e-5);
        assert_eq!(similar[1].0, "kuningatar");
    }

    #[test]
    fn unknown_token_is_reported() {
        let sim = toy();
        let err = sim.most_similar_words("prinssi", 3).unwrap_err();
        assert!(matches!(err, Doc2TopicError::UnknownToken(t) if t == "prinssi"));
    }

    #[test]
    fn zero_vector_has_zero_similarity() {
        let sim = toy();
        let similar = sim.most_similar_words("tyhjä", 4).unwrap();
        assert!(similar.iter().all(|(_, s)| *s == 0.0));
    }

    #[test]
    fn dominant_topic_is_argmax() {
        let sim = toy();
        assert_eq!(sim.dominant_topic("kuningas").unwrap(), 0);
        assert_eq!(sim.dominant_topic("auto").unwrap(), 1);
    }

    #[test]
    fn mismatched_vocabulary_is_rejected() {
        let vocab = Vocabulary::new();
        assert!(Similarity::new(array![[1.0f32]], vocab).is_err());
    }
}
