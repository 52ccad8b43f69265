use std::error::Error;

/// Boxed static error type
pub type Err = Box<dyn Error + 'static>;

/// Takes a list where each element is a set of choices, and returns all the possible sets
/// generated. Will clone the elements. The first choice varies fastest.
///
/// ```
/// let v = vec![
///   vec![0, 1, 2],
///   vec![10, 20],
/// ];
///
/// assert_eq!(morphochart::utils::combinations(&v), vec![
///   vec![0, 10],
///   vec![1, 10],
///   vec![2, 10],
///   vec![0, 20],
///   vec![1, 20],
///   vec![2, 20],
/// ]);
/// ```
pub fn combinations<T>(list: &[Vec<T>]) -> Vec<Vec<T>>
where
  T: Clone,
{
  if list.is_empty() {
    Vec::new()
  } else if list.len() == 1 {
    list[0].iter().map(|e| vec![e.clone()]).collect()
  } else {
    let (head, tail) = list.split_at(1);
    let head = &head[0];

    combinations(tail)
      .into_iter()
      .flat_map(|subseq| {
        // prepend every element of the head to every possible subseq
        head.iter().map(move |v| {
          let mut newseq = subseq.clone();
          newseq.insert(0, v.clone());
          newseq
        })
      })
      .collect()
  }
}
