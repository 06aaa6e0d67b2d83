use {
    crate::*,
    derive_deref::{Deref, DerefMut},
    nom::{
        bytes::complete::{tag, take_while_m_n},
        character::complete::line_ending,
        combinator::{map, map_opt, opt},
        error::Error,
        multi::{many0, many0_count, many_m_n},
        sequence::{separated_pair, terminated},
        Err, IResult,
    },
    num::Num,
    static_assertions::const_assert,
    std::ops::AddAssign,
};

#[cfg_attr(test, derive(Debug, PartialEq))]
#[derive(Clone, Copy)]
#[repr(transparent)]
struct ElementIndex(u8);

impl From<usize> for ElementIndex {
    fn from(element_index: usize) -> Self {
        ElementIndex(element_index as u8)
    }
}

impl From<ElementIndex> for usize {
    fn from(element_index: ElementIndex) -> Self {
        element_index.0 as usize
    }
}

#[cfg_attr(test, derive(Debug, PartialEq))]
#[derive(Clone, Default, Deref, DerefMut)]
#[repr(transparent)]
struct Polymer(Vec<ElementIndex>);

/// The expansion of every ordered element pair after a fixed number of insertion rounds, indexed
/// by pair index. A pair with no rule expands to itself.
#[cfg_attr(test, derive(Debug, PartialEq))]
#[derive(Deref)]
#[repr(transparent)]
struct BlownUpRules(Vec<Polymer>);

#[cfg_attr(test, derive(PartialEq))]
#[derive(Debug, Default, Deref, DerefMut)]
#[repr(transparent)]
struct ElementFrequencies(Vec<(char, usize)>);

#[cfg_attr(test, derive(Debug, PartialEq))]
#[derive(Default)]
pub struct Solution {
    elements: Vec<char>,
    template: Polymer,
    insertions: Vec<Option<ElementIndex>>,
}

type Pair = [u8; Solution::PAIR_SIZE];

impl Solution {
    const PAIR_SIZE: usize = 2_usize;
    const MAX_ELEMENTS_LEN: usize = 1_usize << u8::BITS;

    /// Ceiling on the rounds a single pair gets blown up for. A 2-element seed grows to
    /// `1 << rounds` pairs, so this is also the memory ceiling for one cached expansion.
    const MAX_HALF_ROUNDS: usize = 20_usize;

    const Q1_ROUNDS: usize = 10_usize;
    const Q2_ROUNDS: usize = 40_usize;

    fn is_ascii_uppercase(c: char) -> bool {
        c.is_ascii_uppercase()
    }

    fn pair_from_valid_slice(input: &[u8]) -> Pair {
        let mut pair: Pair = Pair::default();

        pair.clone_from_slice(input);

        pair
    }

    fn pair_from_valid_str(input: &str) -> Pair {
        Self::pair_from_valid_slice(input.as_bytes())
    }

    fn first_byte(input: &str) -> u8 {
        input.as_bytes()[0_usize]
    }

    fn parse_element<'i>(input: &'i str) -> IResult<&'i str, u8> {
        map(
            take_while_m_n(1_usize, 1_usize, Self::is_ascii_uppercase),
            Self::first_byte,
        )(input)
    }

    fn parse_pair_insertion_rule<'i>(input: &'i str) -> IResult<&'i str, (Pair, u8)> {
        terminated(
            separated_pair(
                map(
                    take_while_m_n(Self::PAIR_SIZE, Self::PAIR_SIZE, Self::is_ascii_uppercase),
                    Self::pair_from_valid_str,
                ),
                tag(" -> "),
                Self::parse_element,
            ),
            opt(line_ending),
        )(input)
    }

    fn parse<'i>(input: &'i str) -> IResult<&'i str, Self> {
        let mut solution: Self = Self::default();

        let (input, template): (&str, Polymer) = map(
            many0(map_opt(Self::parse_element, |element| {
                solution.try_get_or_add_element_index(element)
            })),
            Polymer,
        )(input)?;

        solution.template = template;

        let (input, _) = many_m_n(2_usize, 2_usize, line_ending)(input)?;

        // The size of the dense `insertions` table depends on the total number of elements, so
        // iterate once through the rules just to finalize that
        many0_count(map_opt(
            Self::parse_pair_insertion_rule,
            |([left_element, right_element], mid_element)| {
                solution.try_get_or_add_element_index(left_element)?;
                solution.try_get_or_add_element_index(right_element)?;
                solution.try_get_or_add_element_index(mid_element)?;

                Some(())
            },
        ))(input)?;

        let num_elements: usize = solution.num_elements();
        let get_element_index =
            |element: u8| Self::try_get_element_index(&solution.elements, element).unwrap();

        let mut insertions: Vec<Option<ElementIndex>> = vec![None; num_elements * num_elements];

        let (input, _) = many0_count(map(
            Self::parse_pair_insertion_rule,
            |([left_element, right_element], mid_element)| {
                insertions[Self::pair_index_from_elements(
                    num_elements,
                    get_element_index(left_element),
                    get_element_index(right_element),
                )] = Some(get_element_index(mid_element));
            },
        ))(input)?;

        solution.insertions = insertions;

        Ok((input, solution))
    }

    #[inline(always)]
    fn num_elements(&self) -> usize {
        self.elements.len()
    }

    fn try_get_element_index(elements: &Vec<char>, element: u8) -> Option<ElementIndex> {
        let element: char = element as char;

        elements
            .iter()
            .position(|existing_element| *existing_element == element)
            .map(From::from)
    }

    fn try_get_or_add_element_index(&mut self, element: u8) -> Option<ElementIndex> {
        if let Some(element_index) = Self::try_get_element_index(&self.elements, element) {
            Some(element_index)
        } else if self.num_elements() < Self::MAX_ELEMENTS_LEN {
            let element_index: ElementIndex = self.num_elements().into();

            self.elements.push(element as char);

            Some(element_index)
        } else {
            None
        }
    }

    #[inline(always)]
    fn pair_index_from_elements(
        num_elements: usize,
        left_element_index: ElementIndex,
        right_element_index: ElementIndex,
    ) -> usize {
        usize::from(left_element_index) * num_elements + usize::from(right_element_index)
    }

    #[inline(always)]
    fn left_element_index_from_pair_index(num_elements: usize, pair_index: usize) -> ElementIndex {
        (pair_index / num_elements).into()
    }

    #[inline(always)]
    fn right_element_index_from_pair_index(num_elements: usize, pair_index: usize) -> ElementIndex {
        (pair_index % num_elements).into()
    }

    #[inline(always)]
    fn pair_index(
        &self,
        left_element_index: ElementIndex,
        right_element_index: ElementIndex,
    ) -> usize {
        Self::pair_index_from_elements(self.num_elements(), left_element_index, right_element_index)
    }

    /// Runs one simultaneous round of pair insertion over a polymer: each adjacent pair emits its
    /// left element plus its inserted element if the pair has a rule, and the final element is
    /// carried over unconditionally.
    fn insertion_round(&self, polymer: &[ElementIndex]) -> Polymer {
        let mut next_polymer: Polymer = Polymer(Vec::with_capacity(
            (polymer.len() * Self::PAIR_SIZE).saturating_sub(1_usize),
        ));

        for pair in polymer.windows(Self::PAIR_SIZE) {
            next_polymer.push(pair[0_usize]);

            if let Some(element_index) =
                self.insertions[self.pair_index(pair[0_usize], pair[1_usize])]
            {
                next_polymer.push(element_index);
            }
        }

        if let Some(element_index) = polymer.last() {
            next_polymer.push(*element_index);
        }

        next_polymer
    }

    /// Blows a single pair up into the polymer it grows into over `rounds` insertion rounds. The
    /// expansion always starts with `left_element_index` and ends with `right_element_index`;
    /// 0 rounds returns the seed pair unchanged.
    fn blow_up_pair(
        &self,
        left_element_index: ElementIndex,
        right_element_index: ElementIndex,
        rounds: usize,
    ) -> Polymer {
        const_assert!(Solution::MAX_HALF_ROUNDS < usize::BITS as usize);

        let mut polymer: Polymer = Polymer(Vec::with_capacity(
            if self.insertions[self.pair_index(left_element_index, right_element_index)].is_some()
            {
                (1_usize << rounds) + 1_usize
            } else {
                // A pair with no rule never grows
                Self::PAIR_SIZE
            },
        ));

        polymer.push(left_element_index);
        polymer.push(right_element_index);

        for _ in 0_usize..rounds {
            polymer = self.insertion_round(&polymer);
        }

        polymer
    }

    fn blown_up_rules(&self, rounds: usize) -> BlownUpRules {
        let num_elements: usize = self.num_elements();

        BlownUpRules(
            (0_usize..num_elements * num_elements)
                .map(|pair_index| {
                    self.blow_up_pair(
                        Self::left_element_index_from_pair_index(num_elements, pair_index),
                        Self::right_element_index_from_pair_index(num_elements, pair_index),
                        rounds,
                    )
                })
                .collect(),
        )
    }

    /// Applies one round of the blown-up rules to a template: the template's first element,
    /// followed by each adjacent pair's expansion minus its leading element. The leading element
    /// is the trailing element of the preceding expansion, which has already been emitted.
    fn expand_once(&self, template: &[ElementIndex], blown_up_rules: &BlownUpRules) -> Polymer {
        let capacity: usize = template
            .windows(Self::PAIR_SIZE)
            .map(|pair| {
                blown_up_rules[self.pair_index(pair[0_usize], pair[1_usize])].len() - 1_usize
            })
            .sum::<usize>()
            + 1_usize;
        let mut expanded_polymer: Polymer = Polymer(Vec::with_capacity(capacity));

        expanded_polymer.extend(template.first().copied());

        for pair in template.windows(Self::PAIR_SIZE) {
            expanded_polymer.extend_from_slice(
                &blown_up_rules[self.pair_index(pair[0_usize], pair[1_usize])][1_usize..],
            );
        }

        expanded_polymer
    }

    fn fill_element_counts<T: AddAssign + Num>(
        polymer: &[ElementIndex],
        element_counts: &mut [T],
    ) {
        for element_index in polymer.iter().copied() {
            element_counts[usize::from(element_index)] += T::one();
        }
    }

    fn new_element_frequencies(&self) -> ElementFrequencies {
        ElementFrequencies(
            self.elements
                .iter()
                .copied()
                .map(|element| (element, 0_usize))
                .collect(),
        )
    }

    fn element_frequencies_after_rounds(&self, rounds: usize) -> ElementFrequencies {
        let half_rounds: usize = rounds / 2_usize;

        assert!(half_rounds <= Self::MAX_HALF_ROUNDS);

        let blown_up_rules: BlownUpRules = self.blown_up_rules(half_rounds);
        let template: Polymer = if rounds % 2_usize != 0_usize {
            // An odd round count can't split evenly across the two phases; run the leftover round
            // directly on the template
            self.insertion_round(&self.template)
        } else {
            self.template.clone()
        };
        let expanded_polymer: Polymer = self.expand_once(&template, &blown_up_rules);
        let num_elements: usize = self.num_elements();
        let mut pair_element_counts: Vec<Option<Vec<u32>>> = vec![None; num_elements * num_elements];
        let mut element_frequencies: ElementFrequencies = self.new_element_frequencies();

        // Each pair's table excludes its expansion's leading element, which the preceding pair's
        // table supplies instead. The sequence head has no preceding pair, so count it here.
        if let Some(element_index) = expanded_polymer.first() {
            element_frequencies[usize::from(*element_index)].1 += 1_usize;
        }

        for pair in expanded_polymer.windows(Self::PAIR_SIZE) {
            let pair_index: usize = self.pair_index(pair[0_usize], pair[1_usize]);
            let element_counts: &Vec<u32> =
                pair_element_counts[pair_index].get_or_insert_with(|| {
                    let mut element_counts: Vec<u32> = vec![0_u32; num_elements];

                    Self::fill_element_counts(
                        &blown_up_rules[pair_index][1_usize..],
                        &mut element_counts,
                    );

                    element_counts
                });

            for (element_frequency, element_count) in element_frequencies
                .iter_mut()
                .zip(element_counts.iter().copied())
            {
                element_frequency.1 += element_count as usize;
            }
        }

        element_frequencies
    }

    fn element_frequency_range(element_frequencies: &ElementFrequencies) -> usize {
        let (min, max): (usize, usize) = element_frequencies
            .iter()
            .copied()
            .filter(|(_, frequency)| *frequency != 0_usize)
            .fold((usize::MAX, usize::MIN), |(min, max), (_, frequency)| {
                (min.min(frequency), max.max(frequency))
            });

        max.saturating_sub(min)
    }

    fn frequency_range_after_rounds(&self, rounds: usize) -> usize {
        Self::element_frequency_range(&self.element_frequencies_after_rounds(rounds))
    }

    fn print_frequency_range_after_rounds(&self, rounds: usize, verbose: bool) {
        if verbose {
            let element_frequencies: ElementFrequencies =
                self.element_frequencies_after_rounds(rounds);
            let frequency_range: usize = Self::element_frequency_range(&element_frequencies);

            dbg!(&element_frequencies);
            println!("{frequency_range}");
        } else {
            println!("{}", self.frequency_range_after_rounds(rounds));
        }
    }

    #[cfg(test)]
    fn polymer_as_string(&self, polymer: &[ElementIndex]) -> String {
        polymer
            .iter()
            .copied()
            .map(|element_index| self.elements[usize::from(element_index)])
            .collect()
    }
}

impl RunQuestions for Solution {
    fn q1_internal(&mut self, args: &QuestionArgs) {
        self.print_frequency_range_after_rounds(Self::Q1_ROUNDS, args.verbose);
    }

    fn q2_internal(&mut self, args: &QuestionArgs) {
        self.print_frequency_range_after_rounds(Self::Q2_ROUNDS, args.verbose);
    }
}

impl<'i> TryFrom<&'i str> for Solution {
    type Error = Err<Error<&'i str>>;

    fn try_from(input: &'i str) -> Result<Self, Self::Error> {
        Ok(Self::parse(input)?.1)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, lazy_static::lazy_static};

    const SOLUTION_1_STR: &str = concat!(
        "NNCB\n",
        "\n",
        "CH -> B\n",
        "HH -> N\n",
        "CB -> H\n",
        "NH -> C\n",
        "HB -> C\n",
        "HC -> B\n",
        "HN -> C\n",
        "NN -> C\n",
        "BH -> H\n",
        "NC -> B\n",
        "NB -> B\n",
        "BN -> B\n",
        "BB -> N\n",
        "BC -> B\n",
        "CC -> N\n",
        "CN -> C\n",
    );

    const SOLUTION_2_STR: &str = concat!(
        "AABBA\n",
        "\n",
        "AA -> B\n",
        "AB -> A\n",
        "BA -> A\n",
        "BB -> A\n",
    );

    const SOLUTION_3_STR: &str = "\
        AABBA\n\
        \n\
        AA -> A\n\
        AB -> A\n\
        BA -> B\n";

    const SOLUTION_4_STR: &str = "\
        N\n\
        \n\
        NN -> C\n";

    lazy_static! {
        static ref SOLUTION_1: Solution = solution_1();
        static ref SOLUTION_2: Solution = solution_2();
        static ref SOLUTION_3: Solution = solution_3();
        static ref SOLUTION_4: Solution = solution_4();
    }

    macro_rules! polymer { [ $( $element_index:expr ),* $(,)? ] => {
        Polymer(vec![ $( ElementIndex($element_index), )* ])
    } }

    macro_rules! solution {
        {
            [ $( $element:expr ),* $(,)? ],
            [ $( $element_index:expr ),* $(,)? ],
            [ $( $insertion:expr ),* $(,)? ]
        } => {
            Solution {
                elements: vec![ $( $element, )* ],
                template: polymer![ $( $element_index, )* ],
                insertions: vec![ $( $insertion.map(ElementIndex), )* ],
            }
        };
    }

    fn solution_1() -> Solution {
        solution! {
            ['N', 'C', 'B', 'H'],
            [0, 0, 1, 2],
            [
                Some(1), Some(2), Some(2), Some(1),
                Some(1), Some(0), Some(3), Some(2),
                Some(2), Some(2), Some(0), Some(3),
                Some(1), Some(2), Some(1), Some(0),
            ]
        }
    }

    fn solution_2() -> Solution {
        solution! {
            ['A', 'B'],
            [0, 0, 1, 1, 0],
            [Some(1), Some(0), Some(0), Some(0)]
        }
    }

    fn solution_3() -> Solution {
        solution! {
            ['A', 'B'],
            [0, 0, 1, 1, 0],
            [Some(0), Some(0), Some(1), None]
        }
    }

    fn solution_4() -> Solution {
        solution! {
            ['N', 'C'],
            [0],
            [Some(1), None, None, None]
        }
    }

    fn brute_force_element_frequencies(solution: &Solution, rounds: usize) -> ElementFrequencies {
        let mut polymer: Polymer = solution.template.clone();

        for _ in 0_usize..rounds {
            polymer = solution.insertion_round(&polymer);
        }

        let mut element_counts: Vec<usize> = vec![0_usize; solution.num_elements()];

        Solution::fill_element_counts(&polymer, &mut element_counts);

        let mut element_frequencies: ElementFrequencies = solution.new_element_frequencies();

        for (element_frequency, element_count) in
            element_frequencies.iter_mut().zip(element_counts)
        {
            element_frequency.1 = element_count;
        }

        element_frequencies
    }

    #[test]
    fn test_try_from_str() {
        assert_eq!(Solution::try_from(SOLUTION_1_STR), Ok(solution_1()));
        assert_eq!(Solution::try_from(SOLUTION_2_STR), Ok(solution_2()));
        assert_eq!(Solution::try_from(SOLUTION_3_STR), Ok(solution_3()));
        assert_eq!(Solution::try_from(SOLUTION_4_STR), Ok(solution_4()));
    }

    #[test]
    fn test_insertion_round() {
        let mut polymer: Polymer = SOLUTION_1.template.clone();

        for expected_polymer in [
            "NNCB",
            "NCNBCHB",
            "NBCCNBBBCBHCB",
            "NBBBCNCCNBBNBNBBCHBHHBCHB",
            "NBBNBNBBCCNBCNCCNBBNBBNBBBNBBNBBCBHCBHHNHCBBCBHCB",
        ] {
            assert_eq!(SOLUTION_1.polymer_as_string(&polymer), expected_polymer);

            polymer = SOLUTION_1.insertion_round(&polymer);
        }
    }

    #[test]
    fn test_blow_up_pair() {
        // 0 rounds returns the seed pair unchanged
        for left in 0_u8..4_u8 {
            for right in 0_u8..4_u8 {
                assert_eq!(
                    SOLUTION_1.blow_up_pair(ElementIndex(left), ElementIndex(right), 0_usize),
                    polymer![left, right]
                );
            }
        }

        assert_eq!(
            SOLUTION_1.polymer_as_string(&SOLUTION_1.blow_up_pair(
                ElementIndex(0_u8),
                ElementIndex(0_u8),
                1_usize
            )),
            "NCN"
        );

        // Boundary elements survive every round count, and full rule coverage doubles the pair
        // count each round
        for rounds in 0_usize..=6_usize {
            for left in 0_u8..4_u8 {
                for right in 0_u8..4_u8 {
                    let expansion: Polymer =
                        SOLUTION_1.blow_up_pair(ElementIndex(left), ElementIndex(right), rounds);

                    assert_eq!(*expansion.first().unwrap(), ElementIndex(left));
                    assert_eq!(*expansion.last().unwrap(), ElementIndex(right));
                    assert_eq!(expansion.len(), (1_usize << rounds) + 1_usize);
                }
            }
        }

        // A pair with no rule passes through unchanged
        assert_eq!(
            SOLUTION_3.blow_up_pair(ElementIndex(1_u8), ElementIndex(1_u8), 6_usize),
            polymer![1, 1]
        );
    }

    #[test]
    fn test_expand_once() {
        for solution in [&*SOLUTION_1, &*SOLUTION_2, &*SOLUTION_3] {
            let mut expected_polymer: Polymer = solution.template.clone();

            for rounds in 0_usize..=5_usize {
                assert_eq!(
                    solution.expand_once(&solution.template, &solution.blown_up_rules(rounds)),
                    expected_polymer,
                    "rounds: {rounds}"
                );

                expected_polymer = solution.insertion_round(&expected_polymer);
            }
        }
    }

    #[test]
    fn test_element_frequencies_after_rounds() {
        for solution in [&*SOLUTION_1, &*SOLUTION_2, &*SOLUTION_3, &*SOLUTION_4] {
            for rounds in 0_usize..=6_usize {
                assert_eq!(
                    solution.element_frequencies_after_rounds(rounds),
                    brute_force_element_frequencies(solution, rounds),
                    "rounds: {rounds}"
                );
            }
        }

        // Under full rule coverage the total count follows the doubling law
        for rounds in 0_usize..=10_usize {
            assert_eq!(
                SOLUTION_1
                    .element_frequencies_after_rounds(rounds)
                    .iter()
                    .map(|(_, frequency)| *frequency)
                    .sum::<usize>(),
                (SOLUTION_1.template.len() - 1_usize) * (1_usize << rounds) + 1_usize,
                "rounds: {rounds}"
            );
        }

        assert_eq!(
            SOLUTION_1.element_frequencies_after_rounds(10_usize),
            ElementFrequencies(vec![
                ('N', 865_usize),
                ('C', 298_usize),
                ('B', 1749_usize),
                ('H', 161_usize),
            ])
        );
    }

    #[test]
    fn test_frequency_range_after_rounds() {
        assert_eq!(SOLUTION_1.frequency_range_after_rounds(10_usize), 1588_usize);
        assert_eq!(
            SOLUTION_1.frequency_range_after_rounds(40_usize),
            2_188_189_693_529_usize
        );

        // Interned elements that never occur don't participate in the minimum
        assert_eq!(SOLUTION_4.frequency_range_after_rounds(10_usize), 0_usize);
    }

    #[test]
    fn test_element_frequency_range() {
        assert_eq!(
            Solution::element_frequency_range(&ElementFrequencies(Vec::new())),
            0_usize
        );
        assert_eq!(
            Solution::element_frequency_range(&ElementFrequencies(vec![('N', 7_usize)])),
            0_usize
        );
        assert_eq!(
            Solution::element_frequency_range(&ElementFrequencies(vec![
                ('N', 7_usize),
                ('C', 0_usize),
                ('B', 3_usize),
            ])),
            4_usize
        );
    }
}
